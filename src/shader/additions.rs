//! Factory functions for the shader additions the built-in batch
//! handlers compose their programs from.
//!
//! Each function is pure: it builds a fresh [`ShaderAddition`] from its
//! parameters and shares no state with previous calls. Handlers call
//! them at construction time to wire up a default configuration, and
//! again whenever a render option needs a differently parametrized
//! addition (for example a new texture count).

use crate::shader::addition::{InjectionPoint, ShaderAddition};

/// Passes the per-vertex texture coordinate through to the fragment
/// stage, where it becomes the working `texCoord` local that later
/// additions sample with or modify.
pub fn get_tex_coord_out() -> ShaderAddition {
    ShaderAddition::new("GetTexCoordOut")
        .with_tag("texture")
        .with_snippet(InjectionPoint::VertexHeader, "varying vec2 outTexCoord;")
        .with_snippet(InjectionPoint::VertexBody, "    outTexCoord = inTexCoord;")
        .with_snippet(InjectionPoint::FragmentHeader, "varying vec2 outTexCoord;")
        .with_snippet(
            InjectionPoint::FragmentBody,
            "    vec2 texCoord = outTexCoord;",
        )
}

/// Provides `texRes`, the resolution of the sampled texture, required
/// by frame clamping and pixel-art smoothing.
pub fn get_tex_res(disable: bool) -> ShaderAddition {
    ShaderAddition::new("GetTexRes")
        .with_tag("texture")
        .with_disable(disable)
        .with_snippet(
            InjectionPoint::FragmentHeader,
            "uniform vec2 uTexRes[TEXTURE_COUNT];",
        )
        .with_snippet(
            InjectionPoint::FragmentBody,
            "\
    vec2 texRes = uTexRes[0];
#if TEXTURE_COUNT > 1
    for (int i = 1; i < TEXTURE_COUNT; i++)
    {
        if (i == int(outTexId + 0.5))
        {
            texRes = uTexRes[i];
        }
    }
#endif",
        )
}

/// Wraps the working texture coordinate inside the frame rectangle, so
/// a quad larger than its frame repeats the frame instead of bleeding
/// into neighbouring atlas entries.
pub fn tex_coord_frame_wrap(disable: bool) -> ShaderAddition {
    ShaderAddition::new("TexCoordFrameWrap")
        .with_tag("tile")
        .with_disable(disable)
        .with_snippet(
            InjectionPoint::FragmentBody,
            "    texCoord = outFrame.xy + fract((texCoord - outFrame.xy) / outFrame.zw) * outFrame.zw;",
        )
}

/// Clamps the working texture coordinate half a texel inside the frame
/// rectangle. Prevents linear filtering from bleeding at tile edges.
pub fn tex_coord_frame_clamp(disable: bool) -> ShaderAddition {
    ShaderAddition::new("TexCoordFrameClamp")
        .with_tag("tile")
        .with_disable(disable)
        .with_snippet(
            InjectionPoint::FragmentBody,
            "\
    vec2 halfTexel = 0.5 / texRes;
    texCoord = clamp(texCoord, outFrame.xy + halfTexel, outFrame.xy + outFrame.zw - halfTexel);",
        )
}

/// Anti-aliased texel snapping for scaled pixel art. Needs derivative
/// support, so it carries the extension directive with it.
pub fn smooth_pixel_art(disable: bool) -> ShaderAddition {
    ShaderAddition::new("SmoothPixelArt")
        .with_tag("texture")
        .with_disable(disable)
        .with_snippet(
            InjectionPoint::Extensions,
            "#extension GL_OES_standard_derivatives : enable",
        )
        .with_snippet(
            InjectionPoint::FragmentHeader,
            "\
vec2 smoothPixelArt (vec2 coord, vec2 res)
{
    vec2 pixel = coord * res;
    vec2 seam = floor(pixel + 0.5);
    pixel = seam + clamp((pixel - seam) / fwidth(pixel), -0.5, 0.5);
    return pixel / res;
}",
        )
        .with_snippet(
            InjectionPoint::FragmentBody,
            "    texCoord = smoothPixelArt(texCoord, texRes);",
        )
}

/// Defines `TEXTURE_COUNT`, the number of texture units the fragment
/// shader addresses. Regenerated whenever the unit budget changes.
pub fn define_tex_count(count: u32) -> ShaderAddition {
    ShaderAddition::new("DefineTexCount")
        .with_tag("texture")
        .with_snippet(
            InjectionPoint::FragmentDefine,
            &format!("#define TEXTURE_COUNT {}", count.max(1)),
        )
}

/// Samples the main texture, routing through the per-vertex texture
/// unit id when more than one unit is in play.
pub fn get_texture() -> ShaderAddition {
    ShaderAddition::new("GetTexture")
        .with_tag("texture")
        .with_snippet(InjectionPoint::VertexHeader, "varying float outTexId;")
        .with_snippet(InjectionPoint::VertexBody, "    outTexId = inTexId;")
        .with_snippet(
            InjectionPoint::FragmentHeader,
            "\
uniform sampler2D uMainSampler[TEXTURE_COUNT];
varying float outTexId;

vec4 sampleMainTexture (vec2 coord)
{
#if TEXTURE_COUNT > 1
    for (int i = 0; i < TEXTURE_COUNT; i++)
    {
        if (i == int(outTexId + 0.5))
        {
            return texture2D(uMainSampler[i], coord);
        }
    }
    return vec4(0.0);
#else
    return texture2D(uMainSampler[0], coord);
#endif
}",
        )
        .with_snippet(
            InjectionPoint::FragmentBody,
            "    texel = sampleMainTexture(texCoord);",
        )
}

/// Combines the sampled texel with the per-vertex tint, honouring the
/// tint-fill flag: 0 multiplies, 1 blends the texel towards a solid
/// fill of the tint color.
pub fn apply_tint() -> ShaderAddition {
    ShaderAddition::new("ApplyTint").with_snippet(
        InjectionPoint::FragmentBody,
        "\
    vec4 texTint = texel * outTint;
    vec4 fillTint = vec4(mix(texel.rgb, outTint.rgb, texel.a), texel.a * outTint.a);
    fragColor = mix(texTint, fillTint, outTintEffect);",
    )
}

/// Declares the light array and shared lighting uniforms, with the
/// maximum light count baked in as a compile-time constant.
pub fn define_lights(max_lights: u32, disable: bool) -> ShaderAddition {
    ShaderAddition::new("DefineLights")
        .with_tag("lighting")
        .with_disable(disable)
        .with_snippet(
            InjectionPoint::FragmentDefine,
            &format!("#define LIGHT_COUNT {}", max_lights.max(1)),
        )
        .with_snippet(
            InjectionPoint::FragmentHeader,
            "\
struct Light
{
    vec3 position;
    vec3 color;
    float intensity;
    float radius;
};

uniform Light uLights[LIGHT_COUNT];
uniform int uLightCount;
uniform vec3 uAmbientLightColor;
uniform vec4 uCamera;",
        )
}

/// Passes the per-vertex texture datum through to the fragment stage.
/// Tile layers store a rotation code there for normal mapping.
pub fn rotation_datum(disable: bool) -> ShaderAddition {
    ShaderAddition::new("RotationDatum")
        .with_tag("tile")
        .with_disable(disable)
        .with_snippet(
            InjectionPoint::VertexHeader,
            "\
attribute float inTexDatum;
varying float outTexDatum;",
        )
        .with_snippet(InjectionPoint::VertexBody, "    outTexDatum = inTexDatum;")
        .with_snippet(InjectionPoint::FragmentHeader, "varying float outTexDatum;")
}

/// Builds the inverse rotation matrix used to bring sampled normals
/// back into world orientation when the normal map is rotated.
pub fn out_inverse_rotation(disable: bool) -> ShaderAddition {
    ShaderAddition::new("OutInverseRotation")
        .with_tag("lighting")
        .with_disable(disable)
        .with_snippet(
            InjectionPoint::VertexHeader,
            "\
uniform float uNormalMapRotation;
varying mat3 outInverseRotationMatrix;",
        )
        .with_snippet(
            InjectionPoint::VertexBody,
            "\
    float inverseRotation = -uNormalMapRotation;
    float rotCos = cos(inverseRotation);
    float rotSin = sin(inverseRotation);
    outInverseRotationMatrix = mat3(
        rotCos, -rotSin, 0.0,
        rotSin, rotCos, 0.0,
        0.0, 0.0, 1.0
    );",
        )
        .with_snippet(
            InjectionPoint::FragmentHeader,
            "varying mat3 outInverseRotationMatrix;",
        )
}

/// Samples the normal map bound next to the diffuse texture and
/// reorients it for lighting.
pub fn get_normal_from_map(disable: bool) -> ShaderAddition {
    ShaderAddition::new("GetNormalFromMap")
        .with_tag("lighting")
        .with_disable(disable)
        .with_snippet(InjectionPoint::FragmentHeader, "uniform sampler2D uNormSampler;")
        .with_snippet(
            InjectionPoint::FragmentBody,
            "\
    vec3 normal = texture2D(uNormSampler, texCoord).rgb;
    normal = normalize(outInverseRotationMatrix * (normal * 2.0 - 1.0));",
        )
}

/// Accumulates diffuse lighting over the tinted texel. When the
/// `SELF_SHADOW` feature is active, texel brightness darkens surfaces
/// that face away from the light.
pub fn apply_lighting(disable: bool) -> ShaderAddition {
    ShaderAddition::new("ApplyLighting")
        .with_tag("lighting")
        .with_disable(disable)
        .with_snippet(
            InjectionPoint::FragmentHeader,
            "\
#ifdef FEATURE_SELF_SHADOW
uniform float uPenumbra;
uniform float uDiffuseFlatThreshold;
#endif",
        )
        .with_snippet(
            InjectionPoint::FragmentBody,
            "\
    vec3 litColor = uAmbientLightColor * fragColor.rgb;
    for (int i = 0; i < LIGHT_COUNT; i++)
    {
        if (i >= uLightCount)
        {
            break;
        }
        Light light = uLights[i];
        vec3 lightDir = vec3((light.position.xy - gl_FragCoord.xy) / uCamera.w, light.position.z);
        vec3 lightNormal = normalize(lightDir);
        float distToSurf = length(lightDir);
        float diffuseFactor = max(dot(normal, lightNormal), 0.0);
#ifdef FEATURE_SELF_SHADOW
        float luma = dot(texel.rgb, vec3(0.299, 0.587, 0.114));
        diffuseFactor *= smoothstep(uDiffuseFlatThreshold - uPenumbra, uDiffuseFlatThreshold + uPenumbra, luma);
#endif
        float radius = light.radius / uCamera.w;
        float attenuation = clamp(1.0 - distToSurf * distToSurf / (radius * radius), 0.0, 1.0);
        litColor += light.color * diffuseFactor * attenuation * light.intensity * fragColor.rgb;
    }
    fragColor = vec4(litColor, fragColor.a);",
        )
}

/// Passes the frame rectangle through to the fragment stage for the
/// wrap and clamp additions.
pub fn out_frame() -> ShaderAddition {
    ShaderAddition::new("OutFrame")
        .with_tag("tile")
        .with_snippet(
            InjectionPoint::VertexHeader,
            "\
attribute vec4 inFrame;
varying vec4 outFrame;",
        )
        .with_snippet(InjectionPoint::VertexBody, "    outFrame = inFrame;")
        .with_snippet(InjectionPoint::FragmentHeader, "varying vec4 outFrame;")
}
