use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use taskqueue_core::{Payload, QueueState, SchedulerEnqueueEvent, SchedulerEntry, Stats};
use taskqueue_dispatcher::Inspector;

use crate::app::Application;

const SEPARATOR: &str = "=================================================";

/// 命令行主结构
#[derive(Parser, Debug)]
#[command(name = "taskqueue")]
#[command(version)]
#[command(about = "分布式任务队列 - 状态查询与周期调度")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 配置文件路径，未指定时按默认路径查找
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// 日志级别，覆盖配置文件中的设置
    #[arg(short, long, global = true, value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: Option<String>,

    /// 日志格式，覆盖配置文件中的设置
    #[arg(long, global = true, value_parser = ["json", "pretty"])]
    pub log_format: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 周期任务管理
    Cron(CronCommands),
    /// 各队列的任务数
    Stats,
    /// 列出某个队列中的任务
    Ls {
        /// 队列状态: enqueued, in_progress, scheduled, retry, dead
        state: QueueState,
    },
    /// 运行周期调度器和转发器
    Run,
}

#[derive(Args, Debug)]
pub struct CronCommands {
    #[command(subcommand)]
    pub action: CronActions,
}

#[derive(Subcommand, Debug)]
pub enum CronActions {
    /// 列出调度条目
    Ls,
    /// 查看调度条目的入队历史
    History {
        /// 条目ID
        #[arg(required = true)]
        entry_ids: Vec<String>,
    },
}

/// 列出调度条目，按spec排序
pub async fn cron_list(app: &Application) -> Result<()> {
    let entries = app
        .registry()
        .list_entries()
        .await
        .context("读取调度条目失败")?;
    print!("{}", render_entries(entries, Utc::now()));
    Ok(())
}

/// 逐个打印条目的入队历史，单个条目读取失败时继续下一个
pub async fn cron_history(app: &Application, entry_ids: &[String]) {
    for (i, entry_id) in entry_ids.iter().enumerate() {
        if i > 0 {
            println!("\n{SEPARATOR}");
        }
        println!();
        println!("Entry: {entry_id}\n");

        match app.registry().list_enqueue_events(entry_id).await {
            Ok(events) => print!("{}", render_events(entry_id, events)),
            Err(e) => println!("error: {e}"),
        }
    }
}

pub async fn stats(app: &Application) -> Result<()> {
    let stats = app
        .inspector()
        .current_stats()
        .await
        .context("读取队列统计失败")?;
    print!("{}", render_stats(&stats));
    Ok(())
}

pub async fn list_state(app: &Application, state: QueueState) -> Result<()> {
    let table = list_table(app.inspector(), state)
        .await
        .with_context(|| format!("读取{state}队列失败"))?;
    print!("{table}");
    Ok(())
}

async fn list_table(inspector: &Inspector, state: QueueState) -> taskqueue_core::Result<String> {
    let (headers, rows): (Vec<&str>, Vec<Vec<String>>) = match state {
        QueueState::Enqueued => (
            vec!["ID", "Type", "Payload"],
            inspector
                .list_enqueued()
                .await?
                .into_iter()
                .map(|t| vec![t.id.to_string(), t.task_type, format_payload(&t.payload)])
                .collect(),
        ),
        QueueState::InProgress => (
            vec!["ID", "Type", "Payload"],
            inspector
                .list_in_progress()
                .await?
                .into_iter()
                .map(|t| vec![t.id.to_string(), t.task_type, format_payload(&t.payload)])
                .collect(),
        ),
        QueueState::Scheduled => (
            vec!["ID", "Type", "Payload", "Process At"],
            inspector
                .list_scheduled()
                .await?
                .into_iter()
                .map(|t| {
                    vec![
                        t.id.to_string(),
                        t.task_type,
                        format_payload(&t.payload),
                        format_time(t.process_at),
                    ]
                })
                .collect(),
        ),
        QueueState::Retry => (
            vec!["ID", "Type", "Payload", "Next Retry", "Last Error", "Retried", "Max Retry"],
            inspector
                .list_retry()
                .await?
                .into_iter()
                .map(|t| {
                    vec![
                        t.id.to_string(),
                        t.task_type,
                        format_payload(&t.payload),
                        format_time(t.process_at),
                        t.error_msg,
                        t.retry_count.to_string(),
                        t.retry_max.to_string(),
                    ]
                })
                .collect(),
        ),
        QueueState::Dead => (
            vec!["ID", "Type", "Payload", "Last Failed", "Last Error"],
            inspector
                .list_dead()
                .await?
                .into_iter()
                .map(|t| {
                    vec![
                        t.id.to_string(),
                        t.task_type,
                        format_payload(&t.payload),
                        format_time(t.last_failed_at),
                        t.error_msg,
                    ]
                })
                .collect(),
        ),
    };

    if rows.is_empty() {
        return Ok(format!("No {state} tasks\n"));
    }
    Ok(render_table(&headers, &rows))
}

fn render_entries(mut entries: Vec<SchedulerEntry>, now: DateTime<Utc>) -> String {
    if entries.is_empty() {
        return "No scheduler entries\n".to_string();
    }
    entries.sort_by(|a, b| a.spec.cmp(&b.spec));

    let rows: Vec<Vec<String>> = entries
        .into_iter()
        .map(|e| {
            vec![
                e.id,
                e.spec,
                e.task_type,
                format_payload(&e.payload),
                e.options.to_string(),
                format_next(e.next, now),
                format_prev(e.prev, now),
            ]
        })
        .collect();
    render_table(
        &["EntryID", "Spec", "Type", "Payload", "Options", "Next", "Prev"],
        &rows,
    )
}

fn render_events(entry_id: &str, mut events: Vec<SchedulerEnqueueEvent>) -> String {
    if events.is_empty() {
        return format!("No scheduler enqueue events found for entry: {entry_id}\n");
    }
    events.sort_by(|a, b| b.enqueued_at.cmp(&a.enqueued_at));

    let rows: Vec<Vec<String>> = events
        .into_iter()
        .map(|e| vec![e.task_id.to_string(), format_time(e.enqueued_at)])
        .collect();
    render_table(&["TaskID", "EnqueuedAt"], &rows)
}

fn render_stats(stats: &Stats) -> String {
    let rows = vec![vec![
        stats.enqueued.to_string(),
        stats.in_progress.to_string(),
        stats.scheduled.to_string(),
        stats.retry.to_string(),
        stats.dead.to_string(),
    ]];
    let mut out = render_table(
        &["Enqueued", "InProgress", "Scheduled", "Retry", "Dead"],
        &rows,
    );
    out.push_str(&format!("\nCaptured at {}\n", format_time(stats.timestamp)));
    out
}

/// 按列宽左对齐输出表格
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_row = |cells: &[&str]| -> String {
        let line = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        format!("{}\n", line.trim_end())
    };

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut out = format_row(headers);
    out.push_str(&format_row(&rule.iter().map(String::as_str).collect::<Vec<_>>()));
    for row in rows {
        out.push_str(&format_row(&row.iter().map(String::as_str).collect::<Vec<_>>()));
    }
    out
}

fn format_payload(payload: &Payload) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| "<invalid payload>".to_string())
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_next(next: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if next <= now {
        return "Now".to_string();
    }
    format!("In {}", format_duration(next - now))
}

fn format_prev(prev: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match prev {
        Some(prev) => format!("{} ago", format_duration(now - prev)),
        None => "No prev run".to_string(),
    }
}

fn format_duration(d: chrono::Duration) -> String {
    let secs = d.num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m{}s", s / 60, s % 60),
        s if s < 86400 => format!("{}h{}m", s / 3600, (s % 3600) / 60),
        s => format!("{}d{}h", s / 86400, (s % 86400) / 3600),
    }
}
