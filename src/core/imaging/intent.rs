// Image-intent detection.
//
// Keyword/regex heuristics that decide whether a chat message is asking
// Setsuna to draw something instead of asking a question. They are tuned to
// miss rather than misfire: a missed request still gets a text answer, a
// false positive spends an image generation on small talk.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageIntent {
    /// Draw something new from a text prompt.
    Generate { prompt: String },
    /// Redraw the attached image in another style.
    StyleTransfer { style: String },
}

static EN_DRAW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:hey\s+setsuna[,!]?\s*)?(?:please\s+|pls\s+)?(?:(?:can|could|would)\s+you\s+(?:please\s+)?)?(?:draw|paint|sketch|illustrate)\s+(?:me\s+|us\s+)?(?P<prompt>.+?)[\s?.!]*$",
    )
    .expect("valid regex")
});

static EN_GENERATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:hey\s+setsuna[,!]?\s*)?(?:please\s+|pls\s+)?(?:(?:can|could|would)\s+you\s+(?:please\s+)?)?(?:generate|create|make|render|produce)\s+(?:me\s+|us\s+)?(?:an?\s+|the\s+|some\s+)?(?:image|picture|pic|photo|drawing|illustration|painting|artwork)s?\b\s*(?:of|showing|with|about|for|:)?\s*(?P<prompt>.*?)[\s?.!]*$",
    )
    .expect("valid regex")
});

static ZH_DRAW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:請|请|可以|能不能|能否|麻煩|麻烦|幫我|帮我|給我|给我|幫忙|帮忙|\s)*(?:畫|画|繪製|绘制)(?:一張|一张|一幅|一個|一个|一隻|一只|個|个|張|张)?\s*[:：]?\s*(?P<prompt>.+?)[\s?？!！。~～]*$",
    )
    .expect("valid regex")
});

static ZH_GENERATE_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:生成|產生|产生|製作|制作|做|來|来)(?:一張|一张|一幅|一些|幾張|几张)?(?:圖片|图片|圖像|图像|照片|插畫|插画)\s*[:：，,]\s*(?P<prompt>.+?)[\s?？!！。]*$",
    )
    .expect("valid regex")
});

static ZH_GENERATE_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:生成|產生|产生|製作|制作|做|來|来)(?:一張|一张|一幅|一些|幾張|几张)(?P<prompt>.+?)的?(?:圖片|图片|圖像|图像|照片|插畫|插画|圖|图)[\s?？!！。]*$",
    )
    .expect("valid regex")
});

static ZH_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:轉換成|转换成|轉換為|转换为|轉成|转成|變成|变成|改成|換成|换成)\s*(?P<style>.+?)\s*的?(?:風格|风格|樣式|样式)?[\s?？!！。]*$",
    )
    .expect("valid regex")
});

static EN_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:turn|convert|transform|make|restyle|redraw)\s+(?:this|it|this\s+image|this\s+picture|the\s+image|the\s+picture)\s+(?:into|to|in|as)\s+(?:an?\s+)?(?P<style>.+?)(?:\s+style)?[\s?.!]*$",
    )
    .expect("valid regex")
});

/// Words that follow "畫" without it meaning "draw" (畫面 = screen, 畫家 = painter...).
const ZH_NOT_DRAWING: &[&str] = &["面", "家", "質", "质", "展", "廊", "風", "风", "素", "作"];

/// English "draw ..." idioms that are not drawing requests.
const EN_NOT_DRAWING: &[&str] = &["conclusion", "attention", "inspiration", "straws", "a blank"];

const ZH_IMAGE_SUFFIXES: &[&str] = &["的圖片", "的图片", "的圖", "的图", "圖片", "图片"];

/// Classifies a message. `has_image` says whether it carries an image attachment.
pub fn detect_image_intent(content: &str, has_image: bool) -> Option<ImageIntent> {
    let text = content.trim();
    if text.is_empty() {
        return None;
    }

    if has_image {
        if let Some(style) = capture(&ZH_STYLE, text, "style").or_else(|| capture(&EN_STYLE, text, "style")) {
            return Some(ImageIntent::StyleTransfer { style });
        }
    }

    if let Some(prompt) = capture(&EN_DRAW, text, "prompt") {
        let lower = prompt.to_lowercase();
        if !EN_NOT_DRAWING.iter().any(|w| lower.starts_with(w)) {
            return Some(ImageIntent::Generate { prompt });
        }
    }

    if let Some(prompt) = capture(&EN_GENERATE, text, "prompt") {
        return Some(ImageIntent::Generate { prompt });
    }

    if let Some(prompt) = capture(&ZH_DRAW, text, "prompt") {
        if !ZH_NOT_DRAWING.iter().any(|w| prompt.starts_with(w)) {
            return Some(ImageIntent::Generate {
                prompt: strip_image_suffix(&prompt),
            });
        }
    }

    capture(&ZH_GENERATE_AFTER, text, "prompt")
        .or_else(|| capture(&ZH_GENERATE_BEFORE, text, "prompt"))
        .map(|prompt| ImageIntent::Generate { prompt })
}

fn capture(re: &Regex, text: &str, group: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.name(group).map(|m| m.as_str().trim().to_string()))
        .filter(|s| !s.is_empty())
}

fn strip_image_suffix(prompt: &str) -> String {
    for suffix in ZH_IMAGE_SUFFIXES {
        if let Some(stripped) = prompt.strip_suffix(suffix) {
            if !stripped.trim().is_empty() {
                return stripped.trim().to_string();
            }
        }
    }
    prompt.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(prompt: &str) -> Option<ImageIntent> {
        Some(ImageIntent::Generate {
            prompt: prompt.to_string(),
        })
    }

    #[test]
    fn test_english_draw_requests() {
        assert_eq!(detect_image_intent("draw a cat on the moon", false), generate("a cat on the moon"));
        assert_eq!(
            detect_image_intent("Can you please draw me a dragon?", false),
            generate("a dragon")
        );
    }

    #[test]
    fn test_english_generate_requests() {
        assert_eq!(
            detect_image_intent("generate an image of a sunset over Taipei 101", false),
            generate("a sunset over Taipei 101")
        );
        assert_eq!(
            detect_image_intent("could you make a picture showing two foxes!", false),
            generate("two foxes")
        );
    }

    #[test]
    fn test_chinese_draw_requests() {
        assert_eq!(detect_image_intent("幫我畫一隻貓", false), generate("貓"));
        assert_eq!(detect_image_intent("畫一張夕陽下的海邊！", false), generate("夕陽下的海邊"));
        assert_eq!(detect_image_intent("請幫我畫一張狗的圖片", false), generate("狗"));
    }

    #[test]
    fn test_chinese_generate_requests() {
        assert_eq!(detect_image_intent("生成圖片：櫻花樹下的少女", false), generate("櫻花樹下的少女"));
        assert_eq!(detect_image_intent("生成一張星空的圖片", false), generate("星空"));
    }

    #[test]
    fn test_style_transfer_needs_attachment() {
        assert_eq!(
            detect_image_intent("把這張轉換成吉卜力風格", true),
            Some(ImageIntent::StyleTransfer {
                style: "吉卜力".to_string()
            })
        );
        assert_eq!(
            detect_image_intent("turn this into a watercolor style", true),
            Some(ImageIntent::StyleTransfer {
                style: "watercolor".to_string()
            })
        );
        assert_eq!(detect_image_intent("把這張轉換成吉卜力風格", false), None);
    }

    #[test]
    fn test_plain_chat_is_not_an_image_request() {
        for text in [
            "hello setsuna, how are you?",
            "what's the weather like",
            "畫面好漂亮",
            "這個計畫怎麼樣",
            "let's draw conclusions from the data",
            "generate a report for me",
            "how do I generate an image of a cat in Python?",
            "I want to make a picture of my dog look brighter, any tips?",
            "why does it create a picture of the wrong size",
            "",
        ] {
            assert_eq!(detect_image_intent(text, false), None, "misfired on {text:?}");
        }
    }

    #[test]
    fn test_polite_generate_request_still_matches() {
        assert_eq!(
            detect_image_intent("Hey Setsuna, please create a picture of a lighthouse at dusk", false),
            generate("a lighthouse at dusk")
        );
    }

    #[test]
    fn test_request_without_subject_is_ignored() {
        assert_eq!(detect_image_intent("generate an image", false), None);
    }
}
