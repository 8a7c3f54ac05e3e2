use crate::core::ai::formatting::{split_message, truncate_chars, DISCORD_MESSAGE_LIMIT};
use crate::core::imaging::{GeneratedImage, ImageRequest, ImagingError, OcrBackend, VisionTask};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum OcrEngineChoice {
    #[name = "Gemini (vision model)"]
    Gemini,
    #[name = "Tesseract (local)"]
    Tesseract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum DescribeMode {
    #[name = "Describe (what's in the picture)"]
    Describe,
    #[name = "Analyze (type, purpose, details)"]
    Analyze,
}

/// Picks the vision task for `/describe`; a question always wins.
pub fn vision_task(mode: Option<DescribeMode>, question: Option<String>) -> VisionTask {
    match question.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()) {
        Some(q) => VisionTask::Ask(q),
        None => match mode.unwrap_or(DescribeMode::Describe) {
            DescribeMode::Describe => VisionTask::Describe,
            DescribeMode::Analyze => VisionTask::Analyze,
        },
    }
}

/// Whether an attachment looks like a picture, by MIME type or extension.
pub fn is_image(attachment: &serenity::Attachment) -> bool {
    attachment
        .content_type
        .as_deref()
        .map(|t| t.starts_with("image/"))
        .unwrap_or_else(|| {
            let name = attachment.filename.to_lowercase();
            [".png", ".jpg", ".jpeg", ".gif", ".webp"]
                .iter()
                .any(|ext| name.ends_with(ext))
        })
}

/// Builds a reply carrying a generated image.
pub fn image_attachment(image: &GeneratedImage) -> serenity::CreateAttachment {
    serenity::CreateAttachment::bytes(
        image.image.bytes.clone(),
        format!("setsuna.{}", image.image.extension()),
    )
}

/// Short user-facing text for an imaging failure.
pub fn describe_error(err: &ImagingError) -> String {
    match err {
        ImagingError::Busy => "⏳ I'm already drawing something in this channel, please wait a moment!".to_string(),
        ImagingError::NoImage(reason) => format!("😿 I couldn't make an image this time: {}", reason),
        ImagingError::NotConfigured(what) => format!("⚠️ {} is not configured on this bot.", what),
        ImagingError::Download(_) => "❌ I couldn't download that image.".to_string(),
        other => {
            tracing::error!("Imaging error: {}", other);
            "❌ Something went wrong while working on the image. Please try again later.".to_string()
        }
    }
}

/// Generate an image with Gemini
#[poise::command(slash_command, guild_only)]
pub async fn imagine(
    ctx: Context<'_>,
    #[description = "What to draw (or the style to apply)"] prompt: String,
    #[description = "Optional picture to restyle"] image: Option<serenity::Attachment>,
) -> Result<(), Error> {
    if let Some(att) = &image {
        if !is_image(att) {
            ctx.say("❌ That attachment is not an image.").await?;
            return Ok(());
        }
    }

    if ctx.data().imaging.is_busy(ctx.channel_id().get()) {
        ctx.say(describe_error(&ImagingError::Busy)).await?;
        return Ok(());
    }

    ctx.defer().await?;

    let request = ImageRequest {
        prompt: prompt.trim().to_string(),
        source_image_url: image.map(|a| a.url),
    };

    match ctx
        .data()
        .imaging
        .generate(ctx.channel_id().get(), request)
        .await
    {
        Ok(generated) => {
            let mut reply = poise::CreateReply::default().attachment(image_attachment(&generated));
            if let Some(caption) = &generated.caption {
                reply = reply.content(truncate_chars(
                    caption,
                    DISCORD_MESSAGE_LIMIT,
                ));
            }
            ctx.send(reply).await?;
        }
        Err(e) => {
            ctx.say(describe_error(&e)).await?;
        }
    }
    Ok(())
}

/// Describe an image or answer a question about it
#[poise::command(slash_command)]
pub async fn describe(
    ctx: Context<'_>,
    #[description = "The image"] image: serenity::Attachment,
    #[description = "Question about the image (optional)"] question: Option<String>,
    #[description = "Plain description or a deeper analysis (default: describe)"] mode: Option<
        DescribeMode,
    >,
) -> Result<(), Error> {
    if !is_image(&image) {
        ctx.say("❌ That attachment is not an image.").await?;
        return Ok(());
    }
    ctx.defer().await?;

    let task = vision_task(mode, question);

    match ctx.data().imaging.analyze(&image.url, &task).await {
        Ok(text) => send_chunked(ctx, &text).await?,
        Err(e) => {
            ctx.say(describe_error(&e)).await?;
        }
    }
    Ok(())
}

/// Extract the text from an image
#[poise::command(slash_command)]
pub async fn ocr(
    ctx: Context<'_>,
    #[description = "The image"] image: serenity::Attachment,
    #[description = "Which OCR engine to use (default: Gemini)"] engine: Option<OcrEngineChoice>,
) -> Result<(), Error> {
    if !is_image(&image) {
        ctx.say("❌ That attachment is not an image.").await?;
        return Ok(());
    }
    ctx.defer().await?;

    let backend = match engine.unwrap_or(OcrEngineChoice::Gemini) {
        OcrEngineChoice::Gemini => OcrBackend::Gemini,
        OcrEngineChoice::Tesseract => OcrBackend::Tesseract,
    };

    match ctx.data().imaging.ocr(&image.url, backend).await {
        Ok(text) if text.trim().is_empty() => {
            ctx.say("No readable text found in this image.").await?;
        }
        Ok(text) => send_chunked(ctx, &format!("📝 **Recognized text:**\n{}", text)).await?,
        Err(e) => {
            ctx.say(describe_error(&e)).await?;
        }
    }
    Ok(())
}

async fn send_chunked(ctx: Context<'_>, text: &str) -> Result<(), Error> {
    for chunk in split_message(text, DISCORD_MESSAGE_LIMIT) {
        ctx.say(chunk).await?;
    }
    Ok(())
}
