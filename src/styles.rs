use serde::Serialize;

use crate::plans::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleTier {
    Free,
    Pro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleCategory {
    Icon,
    Character,
    Illustration,
    Artistic,
    Design,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StyleOption {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub emoji: &'static str,
    pub category: StyleCategory,
    pub tier: StyleTier,
    #[serde(skip)]
    pub prompt: &'static str,
}

/// Whether a style tier is usable for a given plan. Intentionally binary:
/// any paid plan unlocks every pro style, and the override flag bypasses
/// the gate entirely.
pub fn is_accessible(plan: Plan, override_flag: bool, tier: StyleTier) -> bool {
    override_flag || tier == StyleTier::Free || plan.is_paid()
}

pub fn find_style(id: &str) -> Option<&'static StyleOption> {
    STYLE_OPTIONS.iter().find(|style| style.id == id)
}

pub static STYLE_OPTIONS: &[StyleOption] = &[
    // Icons
    StyleOption {
        id: "flat",
        name: "Flat Icon",
        description: "Clean, minimal solid colors",
        emoji: "🎨",
        category: StyleCategory::Icon,
        tier: StyleTier::Free,
        prompt: "You are a professional icon designer. Transform the attached rough sketch into a polished flat design icon: a cohesive palette of 3-5 solid vibrant colors, no gradients or shadows, sharp geometric shapes, readable at 64x64px, a single centered icon on a white background filling ~80% of the canvas.",
    },
    StyleOption {
        id: "lineart",
        name: "Line Art",
        description: "Precise single-weight strokes",
        emoji: "✏️",
        category: StyleCategory::Icon,
        tier: StyleTier::Free,
        prompt: "You are a master illustrator specializing in line art. Transform the attached rough sketch into elegant line art: clean uniform-weight black strokes on pure white, smooth continuous lines, refined proportions, shading only through line density. No fills, no colors.",
    },
    StyleOption {
        id: "pixel",
        name: "Pixel Art",
        description: "Retro 8-bit game style",
        emoji: "👾",
        category: StyleCategory::Icon,
        tier: StyleTier::Free,
        prompt: "You are a pixel art specialist. Transform the attached rough sketch into authentic pixel art: a limited 8-16 color palette, clearly visible grid-aligned pixels, no anti-aliasing, deliberate dithering for shading, darker-shade outlining, recognizable at 32x32 to 64x64 logical pixels.",
    },
    StyleOption {
        id: "sticker",
        name: "Sticker",
        description: "Bold outline, vibrant fill",
        emoji: "🏷️",
        category: StyleCategory::Icon,
        tier: StyleTier::Free,
        prompt: "You are a sticker designer for messaging apps. Transform the attached rough sketch into a vibrant sticker: bold dark outline, bright saturated fills, a white die-cut border around the whole design, slight drop shadow, minimal but impactful detail.",
    },
    // Characters
    StyleOption {
        id: "kawaii",
        name: "Kawaii",
        description: "Cute Japanese-style character",
        emoji: "🌸",
        category: StyleCategory::Character,
        tier: StyleTier::Free,
        prompt: "You are a kawaii character designer. Transform the attached rough sketch into an adorable kawaii illustration: soft pastel colors, rounded shapes, dot eyes and blush marks where a face fits, small sparkles or hearts, chibi-like proportions, light background.",
    },
    StyleOption {
        id: "chibi",
        name: "Chibi",
        description: "Super-deformed cute style",
        emoji: "🧸",
        category: StyleCategory::Character,
        tier: StyleTier::Pro,
        prompt: "You are a chibi character artist. Transform the attached rough sketch into a super-deformed chibi character: roughly 1:1 head-to-body ratio, large expressive eyes with highlights, tiny hands and feet, bright anime colors with clean 2-3 tone cel-shading, black outlines with varying weight. Anthropomorphize non-character subjects.",
    },
    StyleOption {
        id: "anime",
        name: "Anime",
        description: "Japanese animation style",
        emoji: "⚡",
        category: StyleCategory::Character,
        tier: StyleTier::Pro,
        prompt: "You are a professional anime illustrator. Transform the attached rough sketch into a polished anime illustration: clean outlines, 2-3 levels of cel-shading with hard shadow edges, detailed expressive eyes, dynamic hair groupings, vibrant harmonious palette, subtle rim lighting.",
    },
    StyleOption {
        id: "mascot",
        name: "Mascot",
        description: "Brand character design",
        emoji: "🦊",
        category: StyleCategory::Character,
        tier: StyleTier::Pro,
        prompt: "You are a brand mascot designer. Transform the attached rough sketch into a professional mascot character: friendly and approachable, bold clean shapes with strong silhouette recognition, a 4-5 color palette, vector-like rendering that works from favicon to billboard scale, white background.",
    },
    // Illustrations
    StyleOption {
        id: "isometric",
        name: "3D Isometric",
        description: "Depth with 30° perspective",
        emoji: "📦",
        category: StyleCategory::Illustration,
        tier: StyleTier::Free,
        prompt: "You are an isometric illustration specialist. Transform the attached rough sketch into a polished 3D isometric illustration: strict 30-degree parallel projection, bright modern colors with flat surfaces, distinct brightness per plane (top lightest), crisp geometric edges, white background with a subtle shadow.",
    },
    StyleOption {
        id: "watercolor",
        name: "Watercolor",
        description: "Soft painted art style",
        emoji: "💧",
        category: StyleCategory::Illustration,
        tier: StyleTier::Pro,
        prompt: "You are a watercolor painting master. Transform the attached rough sketch into a watercolor illustration: soft color bleeds and wet-on-wet effects, white paper preserved as highlights, edges varying between soft blends and dry-brush strokes, visible paper texture, layered transparent washes.",
    },
    StyleOption {
        id: "neon",
        name: "Neon Glow",
        description: "Glowing neon light effect",
        emoji: "💜",
        category: StyleCategory::Illustration,
        tier: StyleTier::Pro,
        prompt: "You are a neon art designer. Transform the attached rough sketch into glowing neon tubes on a near-black background: electric cyan, hot magenta, and vivid purple tubes with a bright white core, saturated mid-glow and soft outer glow, subtle haze catching the light, cyberpunk mood.",
    },
    // Artistic
    StyleOption {
        id: "woodcut",
        name: "Woodcut",
        description: "Traditional block print",
        emoji: "🪵",
        category: StyleCategory::Artistic,
        tier: StyleTier::Pro,
        prompt: "You are a traditional woodcut printmaking artist. Transform the attached rough sketch into a woodcut-style print: pure two-tone black ink on white, forms rendered through carved cross-hatching and contour-following line patterns, rough hand-carved marks, high contrast, no smooth gradients.",
    },
    // Design
    StyleOption {
        id: "svg",
        name: "Vector",
        description: "Clean geometric shapes",
        emoji: "📐",
        category: StyleCategory::Design,
        tier: StyleTier::Free,
        prompt: "You are a vector illustration specialist. Transform the attached rough sketch into a clean vector-style graphic: flat colors with mathematically clean shape boundaries, 5-8 harmonious colors, no gradients or textures, precise geometry, centered on a white background.",
    },
    StyleOption {
        id: "minimalist",
        name: "Minimalist",
        description: "Essential form only",
        emoji: "◻️",
        category: StyleCategory::Design,
        tier: StyleTier::Free,
        prompt: "You are a minimalist designer. Transform the attached rough sketch into an ultra-minimal design: the subject reduced to its essential form, at most 2 colors plus black or white, generous whitespace with the subject at 30-40% of the canvas, no textures or shadows, perfect visual balance.",
    },
    StyleOption {
        id: "logo",
        name: "Logo Mark",
        description: "Simple brandable symbol",
        emoji: "⭐",
        category: StyleCategory::Design,
        tier: StyleTier::Pro,
        prompt: "You are a brand identity designer. Transform the attached rough sketch into a clean logo mark: distilled to its most essential geometric form, 1-2 colors maximum, working in single color, instantly recognizable from 16px favicon to billboard scale, strong negative space, centered on white with generous padding.",
    },
    StyleOption {
        id: "blueprint",
        name: "Blueprint",
        description: "Technical schematic style",
        emoji: "📘",
        category: StyleCategory::Design,
        tier: StyleTier::Pro,
        prompt: "You are a technical illustrator. Transform the attached rough sketch into a blueprint-style technical drawing: white lines on deep blueprint blue, a subtle graph-paper grid, dimension lines and annotations, dashed lines for hidden edges, a title block in the bottom-right corner.",
    },
];
