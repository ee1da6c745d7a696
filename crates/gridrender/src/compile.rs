//! GLSL compilation, interface linking and uniform block reflection on top of
//! naga's GLSL front end.
//!
//! This runs without a device, which lets the `check` subcommand and the unit
//! tests exercise the exact path the wgpu backend uses before it hands the
//! validated modules to the driver.

use std::collections::HashMap;

use wgpu::naga;
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::{AddressSpace, Binding, Module, Scalar, TypeInner, VectorSize};

use crate::error::{ShaderError, Stage};
use crate::uniforms::{UniformKind, UniformSlot};

/// A single parsed and validated shader stage.
#[derive(Debug)]
pub struct CompiledStage {
    pub stage: Stage,
    pub module: Module,
}

/// Vertex and fragment stages whose interfaces have been matched.
#[derive(Debug)]
pub struct LinkedStages {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
}

/// Reflected layout of the fragment stage's uniform block.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformLayout {
    pub group: u32,
    pub binding: u32,
    pub block_size: u32,
    pub slots: HashMap<String, UniformSlot>,
}

fn naga_stage(stage: Stage) -> naga::ShaderStage {
    match stage {
        Stage::Vertex => naga::ShaderStage::Vertex,
        Stage::Fragment => naga::ShaderStage::Fragment,
    }
}

/// Parses and validates one stage, tagging any diagnostic with the stage.
pub fn compile_stage(stage: Stage, source: &str) -> Result<CompiledStage, ShaderError> {
    let mut frontend = glsl::Frontend::default();
    let options = glsl::Options::from(naga_stage(stage));
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| ShaderError::Compile {
            stage,
            log: errors.emit_to_string(source),
        })?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|err| ShaderError::Compile {
            stage,
            log: err.emit_to_string(source),
        })?;

    Ok(CompiledStage { stage, module })
}

/// Compiles both stages independently and links their interfaces.
///
/// A vertex failure skips the fragment stage entirely, and any compile failure
/// skips linking.
pub fn build_stages(vertex_source: &str, fragment_source: &str) -> Result<LinkedStages, ShaderError> {
    let vertex = compile_stage(Stage::Vertex, vertex_source)?;
    let fragment = compile_stage(Stage::Fragment, fragment_source)?;
    link_interfaces(&vertex, &fragment)?;
    Ok(LinkedStages { vertex, fragment })
}

/// Checks that every fragment input location is written by the vertex stage
/// with an identical type.
pub fn link_interfaces(vertex: &CompiledStage, fragment: &CompiledStage) -> Result<(), ShaderError> {
    let outputs = stage_interface(&vertex.module, naga::ShaderStage::Vertex, true)?;
    let inputs = stage_interface(&fragment.module, naga::ShaderStage::Fragment, false)?;

    let mut problems = Vec::new();
    for (location, input_ty) in &inputs {
        match outputs.iter().find(|(out_location, _)| out_location == location) {
            None => problems.push(format!(
                "fragment input at location {location} is not written by the vertex stage"
            )),
            Some((_, output_ty)) if output_ty != input_ty => problems.push(format!(
                "type mismatch at location {location}: vertex writes {output_ty:?}, fragment reads {input_ty:?}"
            )),
            Some(_) => {}
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ShaderError::Link {
            log: problems.join("\n"),
        })
    }
}

fn stage_interface(
    module: &Module,
    stage: naga::ShaderStage,
    outputs: bool,
) -> Result<Vec<(u32, TypeInner)>, ShaderError> {
    let entry = module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage)
        .ok_or_else(|| ShaderError::Link {
            log: format!("no {stage:?} entry point"),
        })?;

    let mut locations = Vec::new();
    let mut collect = |binding: Option<&Binding>, ty: naga::Handle<naga::Type>| {
        match binding {
            Some(Binding::Location { location, .. }) => {
                locations.push((*location, module.types[ty].inner.clone()));
            }
            Some(Binding::BuiltIn(_)) => {}
            None => {
                if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                    for member in members {
                        if let Some(Binding::Location { location, .. }) = &member.binding {
                            locations.push((*location, module.types[member.ty].inner.clone()));
                        }
                    }
                }
            }
        }
    };

    if outputs {
        if let Some(result) = &entry.function.result {
            collect(result.binding.as_ref(), result.ty);
        }
    } else {
        for argument in &entry.function.arguments {
            collect(argument.binding.as_ref(), argument.ty);
        }
    }

    Ok(locations)
}

/// Reflects the first uniform block of `module` into a name → slot table.
///
/// Member names carry a leading underscore in the prologue; the table is keyed
/// by the user-facing name with that underscore removed. Members of a type the
/// binder cannot write are left out, which makes them behave as missing.
pub fn reflect_uniforms(module: &Module) -> Option<UniformLayout> {
    module.global_variables.iter().find_map(|(_, variable)| {
        if variable.space != AddressSpace::Uniform {
            return None;
        }
        let TypeInner::Struct { members, span } = &module.types[variable.ty].inner else {
            return None;
        };
        let (group, binding) = variable
            .binding
            .as_ref()
            .map(|binding| (binding.group, binding.binding))
            .unwrap_or((0, 0));

        let mut slots = HashMap::new();
        for member in members {
            let Some(name) = member.name.as_deref() else {
                continue;
            };
            let Some(kind) = uniform_kind(&module.types[member.ty].inner) else {
                tracing::debug!(member = name, "skipping uniform member with unsupported type");
                continue;
            };
            let public = name.strip_prefix('_').unwrap_or(name);
            slots.insert(
                public.to_string(),
                UniformSlot {
                    offset: member.offset,
                    kind,
                },
            );
        }

        Some(UniformLayout {
            group,
            binding,
            block_size: *span,
            slots,
        })
    })
}

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    match inner {
        TypeInner::Scalar(scalar) if *scalar == Scalar::F32 => Some(UniformKind::Float),
        TypeInner::Scalar(scalar) if *scalar == Scalar::I32 => Some(UniformKind::Int),
        TypeInner::Vector {
            size: VectorSize::Bi,
            scalar,
        } if *scalar == Scalar::F32 => Some(UniformKind::Vec2),
        TypeInner::Vector {
            size: VectorSize::Bi,
            scalar,
        } if *scalar == Scalar::I32 => Some(UniformKind::IVec2),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{compose, DEFAULT_BODY, VERTEX_SHADER};

    #[test]
    fn default_body_builds() {
        let stages = build_stages(VERTEX_SHADER, &compose(DEFAULT_BODY)).expect("default program");
        assert_eq!(stages.vertex.stage, Stage::Vertex);
        assert_eq!(stages.fragment.stage, Stage::Fragment);
    }

    #[test]
    fn body_with_helper_functions_builds() {
        let body = r"float wave(float x) {
    return 0.5 + 0.5 * sin(x * 6.2831 + iTime);
}

vec3 palette(float t) {
    return mix(vec3(0.1, 0.2, 0.4), vec3(1.0, 0.8, 0.3), wave(t));
}

void mainImage(out vec4 fragColor, in vec2 fragCoord, in ivec2 cell, in vec2 cellUV) {
    fragColor = vec4(palette(cellUV.x + float(cell.y)), 1.0);
}
";
        let stages = build_stages(VERTEX_SHADER, &compose(body)).expect("helpers resolve");
        assert!(reflect_uniforms(&stages.fragment.module).is_some());
    }

    #[test]
    fn broken_body_reports_fragment_stage() {
        let body = "void mainImage(out vec4 c, in vec2 f, in ivec2 cell, in vec2 uv) { c = undefinedThing; }\n";
        let err = build_stages(VERTEX_SHADER, &compose(body)).unwrap_err();
        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, Stage::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("expected fragment compile error, got {other:?}"),
        }
    }

    #[test]
    fn broken_vertex_stage_skips_fragment() {
        let err = build_stages("#version 450\nvoid main() { nope }\n", "not even parsed").unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: Stage::Vertex,
                ..
            }
        ));
    }

    #[test]
    fn unmatched_fragment_input_fails_to_link() {
        let fragment = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 3) in vec4 v_extra;
layout(location = 0) out vec4 outColor;
void main() { outColor = v_extra + vec4(v_uv, 0.0, 0.0); }
";
        let err = build_stages(VERTEX_SHADER, fragment).unwrap_err();
        match err {
            ShaderError::Link { log } => assert!(log.contains("location 3"), "{log}"),
            other => panic!("expected link error, got {other:?}"),
        }
    }

    #[test]
    fn reflection_exposes_every_prologue_uniform() {
        let fragment = compile_stage(Stage::Fragment, &compose(DEFAULT_BODY)).unwrap();
        let layout = reflect_uniforms(&fragment.module).expect("uniform block");
        assert_eq!((layout.group, layout.binding), (0, 0));
        let expected = [
            ("iResolution", UniformKind::Vec2),
            ("iMouse", UniformKind::Vec2),
            ("iGrid", UniformKind::IVec2),
            ("iTime", UniformKind::Float),
            ("iFrame", UniformKind::Int),
            ("iSeed", UniformKind::Int),
            ("iPaused", UniformKind::Int),
            ("iMouseDown", UniformKind::Int),
        ];
        for (name, kind) in expected {
            let slot = layout.slots.get(name).unwrap_or_else(|| panic!("missing {name}"));
            assert_eq!(slot.kind, kind, "{name}");
            assert!(slot.offset + kind.size() <= layout.block_size);
        }
        assert_eq!(layout.slots.len(), expected.len());
    }

    #[test]
    fn reflection_is_stable_across_rebuilds() {
        let first = compile_stage(Stage::Fragment, &compose(DEFAULT_BODY)).unwrap();
        let second = compile_stage(Stage::Fragment, &compose(DEFAULT_BODY)).unwrap();
        assert_eq!(reflect_uniforms(&first.module), reflect_uniforms(&second.module));
    }
}
