use std::borrow::Cow;

use anyhow::{bail, Result};
use wgpu::naga::ShaderStage;

/// Uniform names supplied by the renderer; user declarations are stripped.
const SCENE_UNIFORMS: [&str; 3] = ["iResolution", "iTime", "iFrame"];

/// Attribute the geometry buffer is bound to.
pub(crate) const POSITION_ATTRIBUTE: &str = "pos";

/// Compiles the user vertex shader, failing fast with the driver message.
pub(crate) fn compile_vertex_shader(
    device: &wgpu::Device,
    source: &str,
) -> Result<wgpu::ShaderModule> {
    let wrapped = wrap_vertex(source)?;
    compile_stage(device, wrapped, ShaderStage::Vertex, "scene vertex")
        .map_err(|err| anyhow::anyhow!("failed to compile vertex shader: {err}"))
}

/// Compiles the user fragment shader, failing fast with the driver message.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    source: &str,
) -> Result<wgpu::ShaderModule> {
    let wrapped = wrap_fragment(source);
    compile_stage(device, wrapped, ShaderStage::Fragment, "scene fragment")
        .map_err(|err| anyhow::anyhow!("failed to compile fragment shader: {err}"))
}

fn compile_stage(
    device: &wgpu::Device,
    wrapped: String,
    stage: ShaderStage,
    label: &str,
) -> Result<wgpu::ShaderModule, wgpu::Error> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrapped),
            stage,
            defines: &[],
        },
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(err),
        None => Ok(module),
    }
}

/// Rewrites a WebGL2-style vertex shader into Vulkan GLSL.
///
/// `#version` and `precision` lines are dropped, the scene uniforms are
/// replaced by the shared uniform block, and vertex inputs receive explicit
/// locations with `pos` pinned to location 0.
pub(crate) fn wrap_vertex(source: &str) -> Result<String> {
    let mut body = String::new();
    let mut next_location = 1;
    let mut has_position = false;

    for line in sanitized_lines(source) {
        let trimmed = line.trim();
        if let Some(declaration) = input_declaration(trimmed) {
            let location = if declared_name(declaration) == Some(POSITION_ATTRIBUTE) {
                has_position = true;
                0
            } else {
                let location = next_location;
                next_location += 1;
                location
            };
            body.push_str(&format!("layout(location = {location}) in {declaration}\n"));
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }

    if !has_position {
        bail!("vertex shader does not declare the `{POSITION_ATTRIBUTE}` attribute");
    }

    Ok(format!("{VERSION_HEADER}{UNIFORM_BLOCK}\n#line 1\n{body}"))
}

/// Rewrites a fragment shader into Vulkan GLSL.
///
/// Two shapes are accepted: a plain `void main()` writing to a declared
/// `out vec4`, or a ShaderToy-style `mainImage(out vec4, in vec2)`. In both
/// cases `gl_FragCoord` is remapped to a bottom-left origin so the output
/// matches a WebGL canvas.
pub(crate) fn wrap_fragment(source: &str) -> String {
    let uses_main_image = source.contains("mainImage");
    let mut body = String::new();
    let mut output_bound = false;

    for line in sanitized_lines(source) {
        let trimmed = line.trim();
        if !uses_main_image && !output_bound {
            if let Some(declaration) = trimmed.strip_prefix("out ") {
                body.push_str(&format!("layout(location = 0) out {declaration}\n"));
                output_bound = true;
                continue;
            }
        }
        body.push_str(line);
        body.push('\n');
    }

    if uses_main_image {
        format!(
            "{VERSION_HEADER}{UNIFORM_BLOCK}{FRAG_COORD_HEADER}{MAIN_IMAGE_HEADER}\n#line 1\n{body}{MAIN_IMAGE_FOOTER}"
        )
    } else {
        format!(
            "{VERSION_HEADER}{UNIFORM_BLOCK}{FRAG_COORD_HEADER}{PLAIN_MAIN_HEADER}\n#line 1\n{body}{PLAIN_MAIN_FOOTER}"
        )
    }
}

fn sanitized_lines(source: &str) -> impl Iterator<Item = &str> {
    let mut skipped_version = false;
    source.lines().filter(move |line| {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
            return false;
        }
        if trimmed.starts_with("precision ") {
            return false;
        }
        let is_scene_uniform = trimmed.starts_with("uniform ")
            && SCENE_UNIFORMS.iter().any(|name| trimmed.contains(name));
        !is_scene_uniform
    })
}

fn input_declaration(trimmed: &str) -> Option<&str> {
    trimmed
        .strip_prefix("in ")
        .or_else(|| trimmed.strip_prefix("attribute "))
        .filter(|rest| rest.ends_with(';'))
}

fn declared_name(declaration: &str) -> Option<&str> {
    declaration
        .trim_end_matches(';')
        .split_whitespace()
        .last()
}

const VERSION_HEADER: &str = "#version 450\n";

/// Uniform block shared by both stages.
///
/// The layout must match `SceneUniforms` in `gpu/uniforms.rs`:
/// std140 packs the float right after the vec3, the int starts at byte 16.
const UNIFORM_BLOCK: &str = r"
layout(std140, set = 0, binding = 0) uniform SceneParams {
    vec3 _iResolution;
    float _iTime;
    int _iFrame;
} scene;

#define iResolution scene._iResolution
#define iTime scene._iTime
#define iFrame scene._iFrame
";

const FRAG_COORD_HEADER: &str = r"
vec4 shadercast_frag_coord;
#define gl_FragCoord shadercast_frag_coord
";

const PLAIN_MAIN_HEADER: &str = r"
#define main shadercast_user_main
";

const MAIN_IMAGE_HEADER: &str = r"
layout(location = 0) out vec4 shadercast_out_color;
";

const PLAIN_MAIN_FOOTER: &str = r"
#undef main
#undef gl_FragCoord
void main() {
    shadercast_frag_coord = vec4(gl_FragCoord.x, iResolution.y - gl_FragCoord.y, gl_FragCoord.z, gl_FragCoord.w);
    shadercast_user_main();
}
";

const MAIN_IMAGE_FOOTER: &str = r"
#undef gl_FragCoord
void main() {
    shadercast_frag_coord = vec4(gl_FragCoord.x, iResolution.y - gl_FragCoord.y, gl_FragCoord.z, gl_FragCoord.w);
    vec4 color = vec4(0.0);
    mainImage(color, shadercast_frag_coord.xy);
    shadercast_out_color = color;
}
";
