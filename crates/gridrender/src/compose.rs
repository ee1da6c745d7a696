//! Textual assembly of the final fragment shader.
//!
//! The user writes only a `mainImage` body. [`compose`] sandwiches it between
//! [`PROLOGUE`], which declares the uniform block and the `#define` aliases,
//! and [`EPILOGUE`], which derives the per-pixel grid cell and calls into the
//! user code. Nothing here inspects the body; a broken body only surfaces once
//! the compiler sees it.
//!
//! The prologue must not declare a `mainImage` prototype: naga orders
//! functions by first declaration, which would put `mainImage` ahead of the
//! helpers it calls.

use crate::types::GridConfig;

/// Produces the final fragment source for a user shader body.
pub fn compose(body: &str) -> String {
    let mut composed = String::with_capacity(PROLOGUE.len() + body.len() + EPILOGUE.len() + 16);
    composed.push_str(PROLOGUE);
    composed.push_str("#line 1\n");
    composed.push_str(body);
    if !body.ends_with('\n') {
        composed.push('\n');
    }
    composed.push_str(EPILOGUE);
    composed
}

/// GLSL prologue injected ahead of every user body.
///
/// The block layout is reflected after each link, so the uniform binder never
/// assumes these offsets. Members carry a leading underscore and are exposed
/// through macros to keep the user-facing names free for the aliases.
pub const PROLOGUE: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform GridParams {
    vec2 _iResolution;
    vec2 _iMouse;
    ivec2 _iGrid;
    float _iTime;
    int _iFrame;
    int _iSeed;
    int _iPaused;
    int _iMouseDown;
} ubo;

#define iResolution ubo._iResolution
#define iMouse ubo._iMouse
#define iGrid ubo._iGrid
#define iTime ubo._iTime
#define iFrame ubo._iFrame
#define iSeed ubo._iSeed
#define iPaused (ubo._iPaused != 0)
#define iMouseDown (ubo._iMouseDown != 0)

";

/// GLSL epilogue computing the cell address and delegating to `mainImage`.
///
/// The clamp keeps the boundary pixel inside the grid when rounding pushes
/// `fragCoord / cellPixelSize` up to exactly `gridSize`.
pub const EPILOGUE: &str = r"void main() {
    vec2 fragCoord = v_uv * iResolution;
    vec2 gridSize = vec2(float(max(1, iGrid.x)), float(max(1, iGrid.y)));
    vec2 cellPixelSize = iResolution / gridSize;
    vec2 rawCell = floor(fragCoord / cellPixelSize);
    ivec2 cell = ivec2(clamp(rawCell, vec2(0.0), gridSize - vec2(1.0)));
    vec2 cellUV = fract(fragCoord / cellPixelSize);

    vec4 color = vec4(0.0);
    mainImage(color, fragCoord, cell, cellUV);
    outColor = color;
}
";

/// Body used when the requested file is unavailable or never compiles.
pub const DEFAULT_BODY: &str = r"float cellHash(vec2 p) {
    return fract(sin(dot(p, vec2(41.0, 289.0))) * 43758.5453);
}

void mainImage(out vec4 fragColor, in vec2 fragCoord, in ivec2 cell, in vec2 cellUV) {
    float h = cellHash(vec2(cell));
    float t = iTime * 0.5 + float(iSeed) * 0.1 + h;
    float wave = 0.5 + 0.5 * cos(6.2831 * (cellUV.x + cellUV.y + t));
    vec3 color = mix(vec3(0.05, 0.1, 0.2), vec3(0.9, 0.8, 0.2), wave);
    color *= 0.7 + 0.3 * cellHash(vec2(cell) + 0.123);
    fragColor = vec4(color, 1.0);
}
";

/// Full-screen triangle vertex shader; `v_uv` runs bottom-up so
/// `v_uv * iResolution` matches a bottom-left pixel origin.
pub const VERTEX_SHADER: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// CPU mirror of the cell addressing in [`EPILOGUE`], using the same `f32`
/// operations in the same order.
///
/// Returns the integer cell and the cell-local coordinate for a fragment.
pub fn cell_for_fragment(
    frag_coord: [f32; 2],
    resolution: [f32; 2],
    grid: GridConfig,
) -> ([i32; 2], [f32; 2]) {
    let grid_size = [grid.columns() as f32, grid.rows() as f32];
    let mut cell = [0i32; 2];
    let mut cell_uv = [0.0f32; 2];
    for axis in 0..2 {
        let cell_pixel_size = resolution[axis] / grid_size[axis];
        let scaled = frag_coord[axis] / cell_pixel_size;
        let raw_cell = scaled.floor();
        cell[axis] = raw_cell.clamp(0.0, grid_size[axis] - 1.0) as i32;
        cell_uv[axis] = scaled - scaled.floor();
    }
    (cell, cell_uv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_wraps_body_between_prologue_and_epilogue() {
        let body = "void mainImage(out vec4 c, in vec2 f, in ivec2 cell, in vec2 uv) { c = vec4(1.0); }";
        let composed = compose(body);
        assert!(composed.starts_with(PROLOGUE));
        assert!(composed.ends_with(EPILOGUE));
        let body_at = composed.find(body).expect("body present");
        assert!(body_at > composed.find("#line 1").unwrap());
        assert!(body_at < composed.find("void main()").unwrap());
    }

    #[test]
    fn compose_keeps_body_text_verbatim() {
        let body = "this is not glsl at all\n";
        let composed = compose(body);
        assert!(composed.contains("#line 1\nthis is not glsl at all\nvoid main()"));
    }

    #[test]
    fn entry_point_is_declared_only_by_the_body() {
        assert!(!PROLOGUE.contains("mainImage"));
        assert!(EPILOGUE.contains("mainImage(color"));
    }

    #[test]
    fn prologue_declares_every_uniform_alias() {
        for name in [
            "iTime",
            "iResolution",
            "iMouse",
            "iMouseDown",
            "iGrid",
            "iPaused",
            "iFrame",
            "iSeed",
        ] {
            assert!(
                PROLOGUE.contains(&format!("#define {name} ")),
                "missing alias for {name}"
            );
            assert!(PROLOGUE.contains(&format!(" _{name};")), "missing member for {name}");
        }
    }

    #[test]
    fn boundary_pixel_maps_into_last_cell() {
        let grid = GridConfig::new(4, 3);
        let (cell, uv) = cell_for_fragment([1279.0, 719.0], [1280.0, 720.0], grid);
        assert_eq!(cell, [3, 2]);
        assert!((uv[0] - 0.996_875).abs() < 1e-4);
        assert!((uv[1] - 0.995_833).abs() < 1e-4);
    }

    #[test]
    fn cell_index_stays_in_bounds_for_awkward_grids() {
        let resolutions = [[1280.0f32, 720.0], [1000.0, 997.0], [333.0, 1.0], [1.0, 1.0]];
        let grids = [(1, 1), (3, 7), (7, 13), (4, 3), (64, 9), (1000, 1)];
        for resolution in resolutions {
            for (cols, rows) in grids {
                let grid = GridConfig::new(cols, rows);
                let below = |v: f32| f32::from_bits(v.to_bits() - 1);
                let samples = [
                    [0.0, 0.0],
                    [0.5, 0.5],
                    [resolution[0] - 0.5, resolution[1] - 0.5],
                    [below(resolution[0]), below(resolution[1])],
                    resolution,
                ];
                for frag in samples {
                    let (cell, uv) = cell_for_fragment(frag, resolution, grid);
                    assert!(
                        (0..cols as i32).contains(&cell[0]) && (0..rows as i32).contains(&cell[1]),
                        "cell {cell:?} out of bounds for grid {cols}x{rows} at {frag:?} / {resolution:?}"
                    );
                    assert!(uv.iter().all(|v| (0.0..1.0).contains(v)));
                }
            }
        }
    }

    #[test]
    fn every_pixel_centre_of_a_row_is_addressed_in_order() {
        let grid = GridConfig::new(7, 1);
        let resolution = [1001.0, 1.0];
        let mut last = 0;
        for x in 0..1001 {
            let (cell, _) = cell_for_fragment([x as f32 + 0.5, 0.5], resolution, grid);
            assert!(cell[0] >= last && cell[0] <= 6);
            last = cell[0];
        }
        assert_eq!(last, 6);
    }
}
