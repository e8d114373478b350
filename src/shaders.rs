//! WGSL sources for the nine solver programs.
//!
//! Each program is the shared prelude (uniform block, fullscreen-triangle
//! vertex stage, sampling helpers) followed by one `fs_main`. Bindings:
//!
//! | Binding | Resource |
//! |---------|----------|
//! | 0 | `StageUniforms` |
//! | 1 | filtering clamp-to-edge sampler |
//! | 2 | first input field (`tex_a`) |
//! | 3 | second input field (`tex_b`), two-input programs only |
//!
//! Neighbour reads land on texel centres, so the filtering sampler returns
//! exact values there and bilinear values everywhere else.

use crate::pipeline::Program;

const PRELUDE: &str = r#"
struct StageUniforms {
    texel_size: vec2<f32>,
    source_texel_size: vec2<f32>,
    dt: f32,
    dissipation: f32,
    curl_strength: f32,
    value: f32,
    point: vec2<f32>,
    radius: f32,
    aspect: f32,
    color: vec4<f32>,
    shading: f32,
    vignette: f32,
    dither: f32,
    time: f32,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> u: StageUniforms;
@group(0) @binding(1)
var field_sampler: sampler;
@group(0) @binding(2)
var tex_a: texture_2d<f32>;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    var uvs = array<vec2<f32>, 3>(
        vec2<f32>(0.0, 1.0),
        vec2<f32>(2.0, 1.0),
        vec2<f32>(0.0, -1.0),
    );

    var out: VertexOutput;
    out.clip_position = vec4<f32>(positions[vertex_index], 0.0, 1.0);
    out.uv = uvs[vertex_index];
    return out;
}

fn fetch_a(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(tex_a, field_sampler, uv, 0.0);
}
"#;

const SECOND_INPUT: &str = r#"
@group(0) @binding(3)
var tex_b: texture_2d<f32>;

fn fetch_b(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(tex_b, field_sampler, uv, 0.0);
}
"#;

// tex_a: velocity
const CURL: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let tx = vec2<f32>(u.texel_size.x, 0.0);
    let ty = vec2<f32>(0.0, u.texel_size.y);
    let l = fetch_a(in.uv - tx).y;
    let r = fetch_a(in.uv + tx).y;
    let up = fetch_a(in.uv - ty).x;
    let down = fetch_a(in.uv + ty).x;
    let curl = 0.5 * ((r - l) - (down - up));
    return vec4<f32>(curl, 0.0, 0.0, 1.0);
}
"#;

// tex_a: velocity, tex_b: curl
const VORTICITY: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let tx = vec2<f32>(u.texel_size.x, 0.0);
    let ty = vec2<f32>(0.0, u.texel_size.y);
    let l = abs(fetch_b(in.uv - tx).x);
    let r = abs(fetch_b(in.uv + tx).x);
    let up = abs(fetch_b(in.uv - ty).x);
    let down = abs(fetch_b(in.uv + ty).x);
    let c = fetch_b(in.uv).x;

    var g = 0.5 * vec2<f32>(r - l, down - up);
    g = g / (length(g) + 0.0001);
    let force = u.curl_strength * c * vec2<f32>(g.y, -g.x);

    let vel = fetch_a(in.uv).xy + force * u.dt;
    return vec4<f32>(vel, 0.0, 1.0);
}
"#;

// tex_a: velocity
const DIVERGENCE: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let t = u.texel_size;
    let c = fetch_a(in.uv).xy;

    var l = fetch_a(in.uv - vec2<f32>(t.x, 0.0)).x;
    var r = fetch_a(in.uv + vec2<f32>(t.x, 0.0)).x;
    var up = fetch_a(in.uv - vec2<f32>(0.0, t.y)).y;
    var down = fetch_a(in.uv + vec2<f32>(0.0, t.y)).y;

    // No-flow walls: the neighbour outside mirrors the negated normal component.
    if (in.uv.x - t.x < 0.0) { l = -c.x; }
    if (in.uv.x + t.x > 1.0) { r = -c.x; }
    if (in.uv.y - t.y < 0.0) { up = -c.y; }
    if (in.uv.y + t.y > 1.0) { down = -c.y; }

    let div = 0.5 * ((r - l) + (down - up));
    return vec4<f32>(div, 0.0, 0.0, 1.0);
}
"#;

// tex_a: pressure, tex_b: divergence
const PRESSURE: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let tx = vec2<f32>(u.texel_size.x, 0.0);
    let ty = vec2<f32>(0.0, u.texel_size.y);
    let l = fetch_a(in.uv - tx).x;
    let r = fetch_a(in.uv + tx).x;
    let up = fetch_a(in.uv - ty).x;
    let down = fetch_a(in.uv + ty).x;
    let div = fetch_b(in.uv).x;
    let p = (l + r + up + down - div) * 0.25;
    return vec4<f32>(p, 0.0, 0.0, 1.0);
}
"#;

// tex_a: pressure, tex_b: velocity
const GRADIENT_SUBTRACT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let tx = vec2<f32>(u.texel_size.x, 0.0);
    let ty = vec2<f32>(0.0, u.texel_size.y);
    let l = fetch_a(in.uv - tx).x;
    let r = fetch_a(in.uv + tx).x;
    let up = fetch_a(in.uv - ty).x;
    let down = fetch_a(in.uv + ty).x;
    let vel = fetch_b(in.uv).xy - 0.5 * vec2<f32>(r - l, down - up);
    return vec4<f32>(vel, 0.0, 1.0);
}
"#;

// tex_a: velocity, tex_b: advected quantity
const ADVECTION: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let vel = fetch_a(in.uv).xy;
    let coord = in.uv - u.dt * vel * u.source_texel_size;
    return u.dissipation * fetch_b(coord);
}
"#;

// tex_a: field receiving the splat
const SPLAT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var p = in.uv - u.point;
    p.x = p.x * u.aspect;
    let r2 = max(u.radius * u.radius, 0.00000001);
    let w = exp(-dot(p, p) / r2);
    let base = fetch_a(in.uv);
    return vec4<f32>(base.xyz + w * u.color.xyz, 1.0);
}
"#;

// tex_a: dye
const DISPLAY: &str = r#"
fn hash(p: vec2<f32>) -> f32 {
    return fract(sin(dot(p, vec2<f32>(12.9898, 78.233))) * 43758.5453);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var c = fetch_a(in.uv).rgb;

    if (u.shading > 0.5) {
        let tx = vec2<f32>(u.source_texel_size.x, 0.0);
        let ty = vec2<f32>(0.0, u.source_texel_size.y);
        let dx = length(fetch_a(in.uv + tx).rgb) - length(fetch_a(in.uv - tx).rgb);
        let dy = length(fetch_a(in.uv + ty).rgb) - length(fetch_a(in.uv - ty).rgb);
        let n = normalize(vec3<f32>(dx, dy, length(u.source_texel_size)));
        let diffuse = clamp(dot(n, vec3<f32>(0.0, 0.0, 1.0)) + 0.7, 0.7, 1.0);
        c = c * diffuse;
    }

    let d = distance(in.uv, vec2<f32>(0.5, 0.5));
    c = c * (1.0 - u.vignette * smoothstep(0.3, 0.75, d));

    let noise = hash(in.clip_position.xy + vec2<f32>(u.time, u.time));
    c = c + (noise - 0.5) / 255.0 * u.dither;

    c = max(c, vec3<f32>(0.0));
    let alpha = clamp(max(c.r, max(c.g, c.b)), 0.0, 1.0);
    return vec4<f32>(c, alpha);
}
"#;

// tex_a: source
const BLIT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return u.value * fetch_a(in.uv);
}
"#;

/// Complete WGSL module for `program`.
pub fn program_source(program: Program) -> String {
    let body = match program {
        Program::Curl => CURL,
        Program::Vorticity => VORTICITY,
        Program::Divergence => DIVERGENCE,
        Program::Pressure => PRESSURE,
        Program::GradientSubtract => GRADIENT_SUBTRACT,
        Program::Advection => ADVECTION,
        Program::Splat => SPLAT,
        Program::Display => DISPLAY,
        Program::Blit => BLIT,
    };
    let second = if program.texture_inputs() > 1 { SECOND_INPUT } else { "" };
    format!("{PRELUDE}{second}{body}")
}
