//! WGSL source for the bilateral kernel.

use gpufx_compute::WorkGroupShape;

/// Compute entry point name.
pub const ENTRY_POINT: &str = "bilateral_gaussian";

/// Bilateral Gaussian filter.
///
/// `{{WG_X}}`/`{{WG_Y}}` are replaced by [`render`]. Accumulates
/// `weight * (sample - center)` so a neighbourhood equal to its centre
/// reproduces the centre exactly.
const BILATERAL_TEMPLATE: &str = r#"
struct BilateralParams {
    dims: vec4<u32>,                // w, h, c, radius
    params: array<vec4<f32>, 4>,    // [0].x spatial coeff, [0].y range coeff
}

@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;
@group(0) @binding(2) var<uniform> p: BilateralParams;

@compute @workgroup_size({{WG_X}}, {{WG_Y}})
fn bilateral_gaussian(@builtin(global_invocation_id) id: vec3<u32>) {
    let w = p.dims.x;
    let h = p.dims.y;
    let c = p.dims.z;
    if id.x >= w || id.y >= h { return; }

    let r = i32(p.dims.w);
    let spatial_coeff = p.params[0].x;
    let range_coeff = p.params[0].y;
    let base = (id.y * w + id.x) * c;

    var center = vec4<f32>(0.0);
    for (var ch = 0u; ch < c; ch = ch + 1u) {
        center[ch] = src[base + ch];
    }

    var acc = vec4<f32>(0.0);
    var wsum = 0.0;
    for (var dy = -r; dy <= r; dy = dy + 1) {
        let sy = i32(id.y) + dy;
        if sy < 0 || sy >= i32(h) { continue; }
        for (var dx = -r; dx <= r; dx = dx + 1) {
            let sx = i32(id.x) + dx;
            if sx < 0 || sx >= i32(w) { continue; }

            let nb = (u32(sy) * w + u32(sx)) * c;
            var diff = vec4<f32>(0.0);
            for (var ch = 0u; ch < c; ch = ch + 1u) {
                diff[ch] = src[nb + ch] - center[ch];
            }

            let d2 = dot(diff, diff);
            let w_space = exp(-f32(dx * dx + dy * dy) * spatial_coeff);
            let w_range = select(exp(-d2 * range_coeff), 1.0, d2 == 0.0);
            let wt = w_space * w_range;
            wsum = wsum + wt;
            acc = acc + wt * diff;
        }
    }

    for (var ch = 0u; ch < c; ch = ch + 1u) {
        var v = center[ch];
        if wsum > 0.0 {
            v = center[ch] + acc[ch] / wsum;
        }
        dst[base + ch] = v;
    }
}
"#;

/// Kernel source with the work-group size filled in.
pub fn render(shape: WorkGroupShape) -> String {
    BILATERAL_TEMPLATE
        .replace("{{WG_X}}", &shape.x().to_string())
        .replace("{{WG_Y}}", &shape.y().to_string())
}
