use std::{env, fs, path::PathBuf};

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Vertex shader. Layout matches `scene::Vertex` and `CameraUbo`:
    //   - binding 0, location 0: R32G32B32_SFLOAT (pos)
    //   - binding 0, location 1: R32G32B32_SFLOAT (color)
    //   - set 0, binding 0: Camera { view, projection }
    let vs_src = r#"
#version 450
layout(location = 0) in vec3 inPos;
layout(location = 1) in vec3 inColor;

layout(set = 0, binding = 0) uniform Camera {
    mat4 view;
    mat4 projection;
} cam;

layout(location = 0) out vec3 vColor;

void main() {
    vColor = inColor;
    gl_Position = cam.projection * cam.view * vec4(inPos, 1.0);
}
"#;

    let fs_src = r#"
#version 450
layout(location = 0) in vec3 vColor;
layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(vColor, 1.0);
}
"#;

    let comp = shaderc::Compiler::new().unwrap();
    let mut opts = shaderc::CompileOptions::new().unwrap();
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_1 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let stages = [
        (vs_src, shaderc::ShaderKind::Vertex, "triangle.vert"),
        (fs_src, shaderc::ShaderKind::Fragment, "triangle.frag"),
    ];
    for (src, kind, name) in stages {
        let spv = comp
            .compile_into_spirv(src, kind, name, "main", Some(&opts))
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8()).unwrap();
    }

    println!("cargo:rerun-if-changed=build.rs");
}
