use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

use narration_pipeline::logging;
use narration_pipeline::workflow::StageReport;
use narration_pipeline::{App, Config, Stage};

#[derive(Parser)]
#[command(name = "narration-pipeline", about = "题目讲解视频生产流水线")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 为题目生成讲解脚本
    Script {
        question_id: String,
        /// 只预览，不落库
        #[arg(long)]
        preview: bool,
    },
    /// 合成配音
    Audio { item_id: Uuid },
    /// 生成字幕
    Captions { item_id: Uuid },
    /// 渲染视频
    Video { item_id: Uuid },
    /// 执行条目剩余的所有阶段
    Advance { item_id: Uuid },
    /// 列出某阶段的候选条目
    Queue { stage: Stage },
    /// 批量执行某阶段
    Batch { stage: Stage },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    let cli = Cli::parse();

    // 加载配置
    let config = Config::load()?;

    let app = App::initialize(config).await?;

    match cli.command {
        Command::Script {
            question_id,
            preview: true,
        } => {
            let script = app.flow().preview_script(&question_id).await?;
            println!("{}", script);
        }
        Command::Script { question_id, .. } => report(&app.script(&question_id).await?),
        Command::Audio { item_id } => report(&app.run_one(Stage::Audio, item_id).await?),
        Command::Captions { item_id } => report(&app.run_one(Stage::Captions, item_id).await?),
        Command::Video { item_id } => report(&app.run_one(Stage::Video, item_id).await?),
        Command::Advance { item_id } => {
            for r in app.advance(item_id).await? {
                report(&r);
            }
        }
        Command::Queue {
            stage: Stage::Script,
        } => {
            let sources = app.script_sources().await?;
            info!("script 阶段共有 {} 道待处理题目", sources.len());
            for question_id in sources {
                println!("{}", question_id);
            }
        }
        Command::Queue { stage } => {
            let items = app.candidates(stage).await?;
            info!("阶段 {} 共有 {} 个候选条目", stage, items.len());
            for item in items {
                println!(
                    "{}\t{}\t{}\t{}",
                    item.id,
                    item.source_question_id,
                    item.status,
                    item.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Command::Batch { stage } => {
            let stats = app.run_stage(stage).await?;
            if stats.failed > 0 {
                anyhow::bail!("{} 个条目处理失败", stats.failed);
            }
        }
    }

    Ok(())
}

fn report(r: &StageReport) {
    info!(
        "✅ {} 阶段完成: 条目 {} 状态 {}",
        r.stage, r.item.id, r.item.status
    );
    if let Some(script) = r.item.script.as_deref().filter(|_| r.stage == Stage::Script) {
        info!("脚本预览: {}", logging::truncate_text(script, 80));
    }
    match (&r.advisory, r.stage.next()) {
        (Some(advisory), _) => warn!("⚠️ {}", advisory),
        (None, Some(next)) => info!("下一阶段: {}", next),
        (None, None) => {}
    }
}
