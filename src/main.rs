use std::io::{self, Write};
use std::time::Instant;

use anyhow::Result;
use tracing::error;

use novel_fetch::{NovelCrawler, NovelInfo, Settings, TextWriter, display_elapsed_time, get_user_input, logger};

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();
    let settings = Settings::load()?;
    let crawler = NovelCrawler::new(&settings).await?;
    let writer = TextWriter::new(settings.output.dir.clone());

    loop {
        println!("\n=== novel-fetch ===");
        match get_user_input() {
            Ok(request) => {
                println!("\n正在抓取 《{}》...", request.name);
                let start = Instant::now();
                match crawler.harvest(&request.sources).await {
                    Ok(catalogue) => {
                        let info = NovelInfo {
                            name: request.name,
                            author: request.author,
                        };
                        let path = writer.write(&catalogue, &info).await?;
                        println!("已保存到 {}", path.display());
                        display_elapsed_time(start.elapsed());
                    }
                    Err(e) => error!("抓取失败: {}", e),
                }
            }
            Err(e) => {
                println!("输入错误: {}", e);
            }
        }

        print!("\n是否继续抓取其他小说? (y/n): ");
        io::stdout().flush()?;
        let mut continue_choice = String::new();
        io::stdin().read_line(&mut continue_choice)?;
        if continue_choice.trim().to_lowercase() != "y" {
            break;
        }
    }

    crawler.shutdown().await;
    println!("程序结束。");
    Ok(())
}
