// Shader compilation
//
// Vulkan consumes SPIR-V. Shader sources are GLSL 450 files on disk, so we
// compile them at runtime with naga: parse, validate, emit SPIR-V words.
// Doing it at runtime means a broken edit shows up as a typed error (and the
// hot reload keeps the old program) instead of a failed build.
//
// "Linking" has no direct Vulkan counterpart. We check the stage interface
// ourselves before pipeline creation: every fragment input must be written by
// the vertex stage, and every vertex input must come from the batch layout.

use ash::vk;
use naga::{Binding, Module, TypeInner};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use super::VulkanDevice;

/// Pipeline stage a shader source is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    fn naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
            ShaderStage::Compute => naga::ShaderStage::Compute,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        })
    }
}

/// Errors from turning shader sources into a usable program
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader source {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("failed to link program:\n{log}")]
    Link { log: String },

    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

/// A validated shader module plus its SPIR-V
pub struct CompiledShader {
    pub stage: ShaderStage,
    pub module: Module,
    pub spirv: Vec<u32>,
}

/// Read and compile a GLSL file
pub fn compile_file(stage: ShaderStage, path: &Path) -> Result<CompiledShader, ShaderError> {
    let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    log::debug!("Compiling {} shader {:?}", stage, path);
    compile_glsl(stage, &source)
}

/// Compile GLSL 450 source to SPIR-V
pub fn compile_glsl(stage: ShaderStage, source: &str) -> Result<CompiledShader, ShaderError> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(stage.naga());

    let module = frontend
        .parse(&options, source)
        .map_err(|errors| ShaderError::Compile {
            stage,
            log: errors.emit_to_string(source),
        })?;

    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|error| ShaderError::Compile {
        stage,
        log: error.emit_to_string(source),
    })?;

    let spirv = naga::back::spv::write_vec(&module, &info, &spirv_options(), None)
        .map_err(|error| ShaderError::Compile {
            stage,
            log: error.to_string(),
        })?;

    Ok(CompiledShader { stage, module, spirv })
}

/// SPIR-V writer settings shared by every stage.
///
/// ADJUST_COORDINATE_SPACE negates gl_Position.y on output, so shaders keep
/// GL's Y-up NDC on Vulkan's Y-down clip space.
fn spirv_options() -> naga::back::spv::Options<'static> {
    let mut options = naga::back::spv::Options::default();
    options.flags |= naga::back::spv::WriterFlags::ADJUST_COORDINATE_SPACE;
    options
}

/// Check that a vertex and fragment shader can form one program.
///
/// `vertex_inputs` are the attribute locations the vertex layout provides.
pub fn check_interface(
    vertex: &CompiledShader,
    fragment: &CompiledShader,
    vertex_inputs: &[u32],
) -> Result<(), ShaderError> {
    let (vs_inputs, vs_outputs) = entry_locations(vertex)?;
    let (fs_inputs, _) = entry_locations(fragment)?;

    let mut problems = Vec::new();

    for location in &vs_inputs {
        if !vertex_inputs.contains(location) {
            problems.push(format!(
                "vertex input at location {} has no attribute in the vertex layout",
                location
            ));
        }
    }

    for location in fs_inputs.difference(&vs_outputs) {
        problems.push(format!(
            "fragment input at location {} is not written by the vertex shader",
            location
        ));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ShaderError::Link { log: problems.join("\n") })
    }
}

/// Input and output `location`s of a shader's entry point
fn entry_locations(shader: &CompiledShader) -> Result<(BTreeSet<u32>, BTreeSet<u32>), ShaderError> {
    let module = &shader.module;
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == shader.stage.naga())
        .ok_or_else(|| ShaderError::Link {
            log: format!("no {} entry point", shader.stage),
        })?;

    let mut inputs = BTreeSet::new();
    for argument in &entry.function.arguments {
        collect_locations(module, argument.ty, argument.binding.as_ref(), &mut inputs);
    }

    let mut outputs = BTreeSet::new();
    if let Some(result) = &entry.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut outputs);
    }

    Ok((inputs, outputs))
}

fn collect_locations(
    module: &Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    out: &mut BTreeSet<u32>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.insert(*location);
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

/// Create a shader module from compiled SPIR-V
pub fn create_shader_module(device: &VulkanDevice, shader: &CompiledShader) -> Result<vk::ShaderModule, ShaderError> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(&shader.spirv);

    let module = unsafe { device.device.create_shader_module(&create_info, None) }?;
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    const VERT: &str = r#"
        #version 450
        layout(location = 0) in vec2 a_position;
        layout(location = 1) in vec3 a_color;
        layout(location = 0) out vec3 v_color;
        void main() {
            v_color = a_color;
            gl_Position = vec4(a_position, 0.0, 1.0);
        }
    "#;

    const FRAG: &str = r#"
        #version 450
        layout(location = 0) in vec3 v_color;
        layout(location = 0) out vec4 o_color;
        void main() {
            o_color = vec4(v_color, 1.0);
        }
    "#;

    fn shipped(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders").join(name)
    }

    #[test]
    fn writer_keeps_y_up() {
        let options = spirv_options();
        assert!(options
            .flags
            .contains(naga::back::spv::WriterFlags::ADJUST_COORDINATE_SPACE));
    }

    #[test]
    fn compiles_to_spirv() {
        let vert = compile_glsl(ShaderStage::Vertex, VERT).unwrap();
        assert_eq!(vert.spirv[0], SPIRV_MAGIC);
        let frag = compile_glsl(ShaderStage::Fragment, FRAG).unwrap();
        assert_eq!(frag.spirv[0], SPIRV_MAGIC);
    }

    #[test]
    fn shipped_shaders_compile_and_link() {
        let vert = compile_file(ShaderStage::Vertex, &shipped("quad.vert")).unwrap();
        let frag = compile_file(ShaderStage::Fragment, &shipped("quad.frag")).unwrap();
        check_interface(&vert, &frag, &[0, 1]).unwrap();

        let comp = compile_file(ShaderStage::Compute, &shipped("values.comp")).unwrap();
        assert_eq!(comp.spirv[0], SPIRV_MAGIC);
    }

    #[test]
    fn syntax_error_is_compile_error() {
        let broken = "#version 450\nvoid main() { gl_Position = vec4(1.0 }\n";
        match compile_glsl(ShaderStage::Vertex, broken) {
            Err(ShaderError::Compile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {:?}", other.err()),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = compile_file(ShaderStage::Fragment, Path::new("no/such/shader.frag")).err();
        assert!(matches!(err, Some(ShaderError::Io { .. })));
    }

    #[test]
    fn unmatched_fragment_input_is_link_error() {
        let frag = r#"
            #version 450
            layout(location = 3) in vec3 v_other;
            layout(location = 0) out vec4 o_color;
            void main() {
                o_color = vec4(v_other, 1.0);
            }
        "#;
        let vert = compile_glsl(ShaderStage::Vertex, VERT).unwrap();
        let frag = compile_glsl(ShaderStage::Fragment, frag).unwrap();

        match check_interface(&vert, &frag, &[0, 1]) {
            Err(ShaderError::Link { log }) => assert!(log.contains("location 3")),
            other => panic!("expected link error, got {:?}", other),
        }
    }

    #[test]
    fn vertex_input_outside_layout_is_link_error() {
        let vert = r#"
            #version 450
            layout(location = 0) in vec2 a_position;
            layout(location = 4) in vec2 a_uv;
            layout(location = 0) out vec3 v_color;
            void main() {
                v_color = vec3(a_uv, 0.0);
                gl_Position = vec4(a_position, 0.0, 1.0);
            }
        "#;
        let vert = compile_glsl(ShaderStage::Vertex, vert).unwrap();
        let frag = compile_glsl(ShaderStage::Fragment, FRAG).unwrap();

        let err = check_interface(&vert, &frag, &[0, 1]).unwrap_err();
        assert!(err.to_string().contains("location 4"));
    }
}
