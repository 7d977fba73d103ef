use std::{env, fs, path::PathBuf};

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Vertex shader. Inputs match `pipeline::Vertex`:
    //   location 0: pos (vec3), 1: color (vec3), 2: normal (vec3),
    //   location 3: uv (vec2), 4: tangent (vec3)
    // set 0 / binding 0 is the per-image transform block (`floe_math::Mvp`).
    let vs_src = r#"
#version 450
layout(set = 0, binding = 0) uniform Transforms {
    mat4 model;
    mat4 view;
    mat4 proj;
} ubo;

layout(location = 0) in vec3 inPos;
layout(location = 1) in vec3 inColor;
layout(location = 2) in vec3 inNormal;
layout(location = 3) in vec2 inUv;
layout(location = 4) in vec3 inTangent;

layout(location = 0) out vec3 vColor;
layout(location = 1) out vec2 vUv;
layout(location = 2) out vec3 vNormal;

void main() {
    gl_Position = ubo.proj * ubo.view * ubo.model * vec4(inPos, 1.0);
    vColor = inColor;
    vUv = inUv;
    vNormal = mat3(ubo.model) * inNormal;
}
"#;

    // Fragment shader: texture * vertex color with a fixed directional light.
    // set 0 / binding 1 is the combined image sampler.
    let fs_src = r#"
#version 450
layout(set = 0, binding = 1) uniform sampler2D albedo;

layout(location = 0) in vec3 vColor;
layout(location = 1) in vec2 vUv;
layout(location = 2) in vec3 vNormal;

layout(location = 0) out vec4 outColor;

void main() {
    vec3 light = normalize(vec3(0.4, 0.6, 1.0));
    float diffuse = 0.35 + 0.65 * max(dot(normalize(vNormal), light), 0.0);
    outColor = vec4(texture(albedo, vUv).rgb * vColor * diffuse, 1.0);
}
"#;

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();

    // The renderer targets Vulkan 1.0 (render pass + framebuffers).
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let vs_spv = comp
        .compile_into_spirv(
            vs_src,
            shaderc::ShaderKind::Vertex,
            "floe.vert",
            "main",
            Some(&opts),
        )
        .unwrap();

    let fs_spv = comp
        .compile_into_spirv(
            fs_src,
            shaderc::ShaderKind::Fragment,
            "floe.frag",
            "main",
            Some(&opts),
        )
        .unwrap();

    fs::write(out.join("vert.spv"), vs_spv.as_binary_u8()).unwrap();
    fs::write(out.join("frag.spv"), fs_spv.as_binary_u8()).unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
