//! In-memory packs serving as the last fallback layers.
//!
//! Two packs live inside the binary. The default pack covers the gbuffers
//! fallback roots plus `shadow` and `final`, so a render never ends up with
//! no program at all. The internal pack holds the blit programs the engine
//! itself schedules between passes.

use shaderpack::MemProvider;

const BASIC_VSH: &str = "\
#version 120

varying vec4 color;

void main() {
    gl_Position = gl_ModelViewProjectionMatrix * gl_Vertex;
    color = gl_Color;
}
";

const BASIC_FSH: &str = "\
#version 120

varying vec4 color;

void main() {
    gl_FragData[0] = color;
}
";

const TEXTURED_VSH: &str = "\
#version 120

varying vec4 color;
varying vec2 texcoord;

void main() {
    gl_Position = gl_ModelViewProjectionMatrix * gl_Vertex;
    color = gl_Color;
    texcoord = (gl_TextureMatrix[0] * gl_MultiTexCoord0).xy;
}
";

const TEXTURED_FSH: &str = "\
#version 120

uniform sampler2D texture;

varying vec4 color;
varying vec2 texcoord;

void main() {
    gl_FragData[0] = texture2D(texture, texcoord) * color;
}
";

const TEXTURED_LIT_VSH: &str = "\
#version 120

varying vec4 color;
varying vec2 texcoord;
varying vec2 lmcoord;

void main() {
    gl_Position = gl_ModelViewProjectionMatrix * gl_Vertex;
    color = gl_Color;
    texcoord = (gl_TextureMatrix[0] * gl_MultiTexCoord0).xy;
    lmcoord = (gl_TextureMatrix[1] * gl_MultiTexCoord1).xy;
}
";

const TEXTURED_LIT_FSH: &str = "\
#version 120

uniform sampler2D texture;
uniform sampler2D lightmap;

varying vec4 color;
varying vec2 texcoord;
varying vec2 lmcoord;

void main() {
    vec4 albedo = texture2D(texture, texcoord) * color;
    albedo.rgb *= texture2D(lightmap, lmcoord).rgb;
    gl_FragData[0] = albedo;
}
";

const SHADOW_VSH: &str = "\
#version 120

varying vec2 texcoord;

void main() {
    gl_Position = gl_ModelViewProjectionMatrix * gl_Vertex;
    texcoord = (gl_TextureMatrix[0] * gl_MultiTexCoord0).xy;
}
";

const SHADOW_FSH: &str = "\
#version 120

uniform sampler2D texture;

varying vec2 texcoord;

void main() {
    gl_FragData[0] = texture2D(texture, texcoord);
}
";

const FINAL_VSH: &str = "\
#version 120

varying vec2 texcoord;

void main() {
    gl_Position = ftransform();
    texcoord = (gl_TextureMatrix[0] * gl_MultiTexCoord0).xy;
}
";

const FINAL_FSH: &str = "\
#version 120

uniform sampler2D colortex0;

varying vec2 texcoord;

void main() {
    gl_FragColor = texture2D(colortex0, texcoord);
}
";

const BLIT_VSH: &str = "\
#version 120

varying vec2 texcoord;

void main() {
    gl_Position = vec4(gl_Vertex.xy * 2.0 - 1.0, 0.0, 1.0);
    texcoord = gl_Vertex.xy;
}
";

const BLIT_COLOR_FSH: &str = "\
#version 120

uniform sampler2D srcColor;

varying vec2 texcoord;

void main() {
    gl_FragColor = texture2D(srcColor, texcoord);
}
";

const BLIT_DEPTH_FSH: &str = "\
#version 120

uniform sampler2D srcDepth;

varying vec2 texcoord;

void main() {
    gl_FragDepth = texture2D(srcDepth, texcoord).r;
}
";

// Mismatched-size blits sample with explicit filtering toward the target
// resolution instead of a straight fetch.
const BLIT_COLOR_SCALED_FSH: &str = "\
#version 120

uniform sampler2D srcColor;
uniform vec2 srcSize;
uniform vec2 dstSize;

varying vec2 texcoord;

void main() {
    vec2 uv = (floor(texcoord * dstSize) + 0.5) / dstSize;
    gl_FragColor = texture2D(srcColor, uv);
}
";

const BLIT_DEPTH_SCALED_FSH: &str = "\
#version 120

uniform sampler2D srcDepth;
uniform vec2 srcSize;
uniform vec2 dstSize;

varying vec2 texcoord;

void main() {
    vec2 uv = (floor(texcoord * dstSize) + 0.5) / dstSize;
    gl_FragDepth = texture2D(srcDepth, uv).r;
}
";

/// The pack used when a user pack is missing a whole fallback chain.
pub fn default_pack() -> MemProvider {
    MemProvider::new()
        .with("/shaders/gbuffers_basic.vsh", BASIC_VSH)
        .with("/shaders/gbuffers_basic.fsh", BASIC_FSH)
        .with("/shaders/gbuffers_textured.vsh", TEXTURED_VSH)
        .with("/shaders/gbuffers_textured.fsh", TEXTURED_FSH)
        .with("/shaders/gbuffers_textured_lit.vsh", TEXTURED_LIT_VSH)
        .with("/shaders/gbuffers_textured_lit.fsh", TEXTURED_LIT_FSH)
        .with("/shaders/shadow.vsh", SHADOW_VSH)
        .with("/shaders/shadow.fsh", SHADOW_FSH)
        .with("/shaders/final.vsh", FINAL_VSH)
        .with("/shaders/final.fsh", FINAL_FSH)
}

/// Engine-scheduled programs that never come from a user pack.
pub fn internal_pack() -> MemProvider {
    MemProvider::new()
        .with("/blit_identical/blit_color.vsh", BLIT_VSH)
        .with("/blit_identical/blit_color.fsh", BLIT_COLOR_FSH)
        .with("/blit_identical/blit_depth.vsh", BLIT_VSH)
        .with("/blit_identical/blit_depth.fsh", BLIT_DEPTH_FSH)
        .with("/blit_mismatched/blit_color.vsh", BLIT_VSH)
        .with("/blit_mismatched/blit_color.fsh", BLIT_COLOR_SCALED_FSH)
        .with("/blit_mismatched/blit_depth.vsh", BLIT_VSH)
        .with("/blit_mismatched/blit_depth.fsh", BLIT_DEPTH_SCALED_FSH)
}
