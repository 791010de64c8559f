use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taskqueue_core::config::AppConfig;

mod app;
mod cli;
mod shutdown;

use app::Application;
use cli::{Cli, Commands, CronActions};
use shutdown::ShutdownManager;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("加载配置失败")?;

    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    let log_format = cli
        .log_format
        .as_deref()
        .unwrap_or(&config.observability.log_format);
    init_logging(log_level, log_format)?;

    let app = Application::new(config).await?;

    match cli.command {
        Commands::Cron(cron) => match cron.action {
            CronActions::Ls => cli::cron_list(&app).await?,
            CronActions::History { entry_ids } => cli::cron_history(&app, &entry_ids).await,
        },
        Commands::Stats => cli::stats(&app).await?,
        Commands::Ls { state } => cli::list_state(&app, state).await?,
        Commands::Run => run(app).await?,
    }

    Ok(())
}

/// 运行后台组件，直到收到Ctrl+C或SIGTERM
async fn run(app: Application) -> Result<()> {
    info!("启动任务队列调度服务");

    let shutdown_manager = ShutdownManager::new();
    let app = Arc::new(app);
    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    // 应用可能在收到信号之前就退出，例如注册周期任务失败
    let joined = tokio::select! {
        result = &mut app_handle => {
            if !shutdown_manager.is_shutdown().await {
                warn!("应用在收到关闭信号之前退出");
            }
            Ok(result)
        }
        signal = wait_for_shutdown_signal() => {
            signal?;
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown().await;
            tokio::time::timeout(Duration::from_secs(30), app_handle).await
        }
    };

    match joined {
        Ok(Ok(Ok(()))) => info!("应用已优雅关闭"),
        Ok(Ok(Err(e))) => {
            error!("应用运行失败: {e:#}");
            return Err(e);
        }
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("任务队列调度服务已退出");
    Ok(())
}

/// 初始化日志系统，日志写到标准错误，标准输出留给查询结果
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("安装Ctrl+C信号处理器失败") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("安装SIGTERM信号处理器失败")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("收到Ctrl+C信号");
        },
        result = terminate => {
            result?;
            info!("收到SIGTERM信号");
        },
    }
    Ok(())
}
