use macroquad::miniquad::*;

pub const SPRITE_VERTEX: &str = r#"#version 100
attribute vec2 in_pos;
attribute vec2 in_uv;
attribute vec4 in_color;
uniform mat4 mvp;
varying lowp vec4 v_color;
varying vec2 v_uv;
void main() {
    gl_Position = mvp * vec4(in_pos, 0.0, 1.0);
    v_color = in_color;
    v_uv = in_uv;
}
"#;

pub const SPRITE_FRAGMENT: &str = r#"#version 100
precision mediump float;
varying lowp vec4 v_color;
varying vec2 v_uv;
uniform sampler2D tex;
void main() {
    vec4 c = texture2D(tex, v_uv) * v_color;
    if (c.a < 0.1) {
        discard;
    }
    gl_FragColor = c;
}
"#;

pub fn sprite_meta() -> ShaderMeta {
    ShaderMeta {
        images: vec!["tex".to_string()],
        uniforms: UniformBlockLayout {
            uniforms: vec![UniformDesc::new("mvp", UniformType::Mat4)],
        },
    }
}

#[repr(C)]
pub struct SpriteUniforms {
    pub mvp: [f32; 16],
}

pub const MAZE_VERTEX: &str = r#"#version 100
attribute vec3 in_pos;
attribute vec2 in_uv;
attribute vec3 in_normal;
uniform mat4 mvp;
uniform mat4 view;
varying vec2 v_uv;
varying vec3 v_normal;
varying float v_depth;
void main() {
    gl_Position = mvp * vec4(in_pos, 1.0);
    v_uv = in_uv;
    v_normal = in_normal;
    v_depth = length((view * vec4(in_pos, 1.0)).xyz);
}
"#;

// fog.x = start, fog.y = end, fog.z = ambient
pub const MAZE_FRAGMENT: &str = r#"#version 100
precision mediump float;
varying vec2 v_uv;
varying vec3 v_normal;
varying float v_depth;
uniform sampler2D tex;
uniform vec4 fog_color;
uniform vec4 fog;
uniform vec4 light_dir;
void main() {
    vec4 c = texture2D(tex, v_uv);
    if (c.a < 0.1) {
        discard;
    }
    float ambient = fog.z;
    float light = max(dot(normalize(v_normal), normalize(light_dir.xyz)), 0.0) * (1.0 - ambient) + ambient;
    float f = clamp((v_depth - fog.x) / max(fog.y - fog.x, 0.0001), 0.0, 1.0);
    gl_FragColor = vec4(mix(c.rgb * light, fog_color.rgb, f), c.a);
}
"#;

pub fn maze_meta() -> ShaderMeta {
    ShaderMeta {
        images: vec!["tex".to_string()],
        uniforms: UniformBlockLayout {
            uniforms: vec![
                UniformDesc::new("mvp", UniformType::Mat4),
                UniformDesc::new("view", UniformType::Mat4),
                UniformDesc::new("fog_color", UniformType::Float4),
                UniformDesc::new("fog", UniformType::Float4),
                UniformDesc::new("light_dir", UniformType::Float4),
            ],
        },
    }
}

#[repr(C)]
pub struct MazeUniforms {
    pub mvp: [f32; 16],
    pub view: [f32; 16],
    pub fog_color: [f32; 4],
    pub fog: [f32; 4],
    pub light_dir: [f32; 4],
}
