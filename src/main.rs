use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use record_filter::lexer::Lexer;
use record_filter::{humanize, FilterConfig, Query};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value as Json;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 用类 SQL 查询过滤 JSON 记录
#[derive(Parser)]
#[clap(name = "record-filter", version)]
struct Cli {
    /// JSON 文件，内容为记录数组
    records: PathBuf,
    /// 过滤器配置文件 (JSON)
    #[clap(long)]
    config: Option<PathBuf>,
    /// 执行一次查询并输出匹配的记录，不进入交互模式
    #[clap(long, short)]
    query: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => FilterConfig::from_json_file(path)?,
        None => FilterConfig::default(),
    };
    let records = load_records(&cli.records)?;
    info!(path = %cli.records.display(), records = records.len(), "loaded records");

    match cli.query {
        Some(query) => {
            let matches = Query::compile_with(&query, &config)?.filter_with(&records, &config)?;
            println!("{}", serde_json::to_string_pretty(&matches)?);
            Ok(())
        }
        None => repl(&records, &config),
    }
}

fn load_records(path: &Path) -> Result<Vec<Json>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("无法读取记录文件 {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("记录文件 {} 必须是 JSON 数组", path.display()))
}

/// 交互命令
#[derive(Debug, PartialEq)]
enum Command<'a> {
    Tokens(&'a str),
    Ast(&'a str),
    Normalize(&'a str),
    Count(&'a str),
    Filter(&'a str),
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let Some(rest) = line.strip_prefix(':') else {
            return Command::Filter(line);
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match name {
            "tokens" => Command::Tokens(arg),
            "ast" => Command::Ast(arg),
            "normalize" => Command::Normalize(arg),
            "count" => Command::Count(arg),
            "help" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            other => Command::Unknown(other),
        }
    }
}

fn repl(records: &[Json], config: &FilterConfig) -> Result<()> {
    let mut editor = DefaultEditor::new().context("无法初始化行编辑器")?;
    println!("--- record-filter: 已加载 {} 条记录，输入 :help 查看命令 ---", records.len());

    loop {
        let line = match editor.readline("filter> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("读取输入失败"),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line)?;

        match Command::parse(line) {
            Command::Quit => break,
            command => {
                if let Err(e) = execute(command, records, config) {
                    println!("✗ {e}");
                }
            }
        }
    }
    Ok(())
}

fn execute(command: Command<'_>, records: &[Json], config: &FilterConfig) -> Result<()> {
    match command {
        Command::Tokens(query) => {
            let normalized = if config.normalize_humanized {
                humanize::normalize(query)
            } else {
                query.to_string()
            };
            for token in Lexer::new(&normalized) {
                println!("{:>4}..{:<4} {}", token.span.start, token.span.end, token.kind);
            }
        }
        Command::Ast(query) => {
            let query = Query::compile_with(query, config)?;
            println!("{}", query.expr());
            println!("{:#?}", query.expr());
        }
        Command::Normalize(query) => println!("{}", humanize::normalize(query)),
        Command::Count(query) => {
            let count = Query::compile_with(query, config)?.count(records)?;
            println!("{count}");
        }
        Command::Filter(query) => {
            let matches = Query::compile_with(query, config)?.filter_with(records, config)?;
            for record in &matches {
                println!("{}", serde_json::to_string(record)?);
            }
            println!("✓ 匹配 {} / {} 条记录", matches.len(), records.len());
        }
        Command::Help => print_help(),
        Command::Unknown(name) => println!("✗ 未知命令 :{name}，输入 :help 查看命令"),
        Command::Quit => {}
    }
    Ok(())
}

fn print_help() {
    println!("<查询>              过滤记录，例如 Age > 25 AND Name != 'Bob'");
    println!(":tokens <查询>      显示词法分析结果");
    println!(":ast <查询>         显示表达式树");
    println!(":normalize <查询>   显示展开人性化数值后的查询");
    println!(":count <查询>       只输出匹配数量");
    println!(":help               显示帮助");
    println!(":quit               退出");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("Age > 1"), Command::Filter("Age > 1"));
        assert_eq!(Command::parse(":ast  Age > 1 "), Command::Ast("Age > 1"));
        assert_eq!(Command::parse(":normalize 10GB"), Command::Normalize("10GB"));
        assert_eq!(Command::parse(":count Tags = 'x'"), Command::Count("Tags = 'x'"));
        assert_eq!(Command::parse(":tokens"), Command::Tokens(""));
        assert_eq!(Command::parse(":q"), Command::Quit);
        assert_eq!(Command::parse(":help"), Command::Help);
        assert_eq!(Command::parse(":bogus x"), Command::Unknown("bogus"));
    }

    #[test]
    fn test_execute_reports_query_errors() {
        let records = vec![serde_json::json!({"Age": 30})];
        let config = FilterConfig::default();
        assert!(execute(Command::Count("Age > 1"), &records, &config).is_ok());
        assert!(execute(Command::Count(""), &records, &config).is_err());
        assert!(execute(Command::Filter("Age >"), &records, &config).is_err());
    }
}
