use mediashrink_common::config::AppConfig;
use mediashrink_lookup::{LinkLookup, TikwmLookup};

pub async fn run(config: &AppConfig, url: String) -> anyhow::Result<()> {
    let client = TikwmLookup::new(&config.lookup)?;
    tracing::debug!(service = client.name(), endpoint = client.endpoint(), "Looking up link");

    let meta = client.lookup(&url).await?;

    println!("Title:  {}", meta.title);
    println!("Author: {}", meta.author.nickname);
    println!("Cover:  {}", meta.cover);
    println!("Video:  {}", meta.play);
    println!("Audio:  {}", meta.music);

    Ok(())
}
