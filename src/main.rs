// ==========================================
// WareWise 仓库异常检测 - 命令行入口
// ==========================================
// 用法:
//   warewise analyze <inventory.json> [--warehouse ID] [--db PATH]
//   warewise validate <CODE> [--warehouse ID] [--db PATH]
//   warewise seed [--db PATH]
// 报告以 JSON 输出到 stdout，日志写 stderr
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use std::process::ExitCode;

use warewise::app::{get_default_db_path, AppState};
use warewise::importer::read_json_rows;

const DEFAULT_WAREHOUSE: &str = "DEFAULT";

/// validate 命令校验不通过时的退出码
const EXIT_INVALID_LOCATION: u8 = 2;

const USAGE: &str = "\
用法:
  warewise analyze <inventory.json> [--warehouse ID] [--db PATH]
  warewise validate <CODE> [--warehouse ID] [--db PATH]
  warewise seed [--db PATH]";

/// 解析后的命令
#[derive(Debug, PartialEq)]
enum Command {
    Analyze { inventory: PathBuf },
    Validate { code: String },
    Seed,
}

#[derive(Debug, PartialEq)]
struct CliArgs {
    command: Command,
    warehouse_id: String,
    db_path: Option<String>,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut positional = Vec::new();
    let mut warehouse_id = DEFAULT_WAREHOUSE.to_string();
    let mut db_path = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--warehouse" | "-w" => {
                warehouse_id = iter
                    .next()
                    .ok_or_else(|| anyhow!("--warehouse 需要参数值"))?
                    .clone();
            }
            "--db" => {
                db_path = Some(iter.next().ok_or_else(|| anyhow!("--db 需要参数值"))?.clone());
            }
            flag if flag.starts_with("--") => bail!("未知参数: {}\n{}", flag, USAGE),
            _ => positional.push(arg.clone()),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("analyze") => Command::Analyze {
            inventory: positional
                .next()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("analyze 需要库存 JSON 文件路径\n{}", USAGE))?,
        },
        Some("validate") => Command::Validate {
            code: positional
                .next()
                .ok_or_else(|| anyhow!("validate 需要库位编码\n{}", USAGE))?,
        },
        Some("seed") => Command::Seed,
        Some(other) => bail!("未知命令: {}\n{}", other, USAGE),
        None => bail!("{}", USAGE),
    };

    Ok(CliArgs {
        command,
        warehouse_id,
        db_path,
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    warewise::logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let db_path = cli.db_path.clone().unwrap_or_else(get_default_db_path);
    tracing::info!("{} v{} 使用数据库: {}", warewise::APP_NAME, warewise::VERSION, db_path);

    let mut state = AppState::new(db_path).await.map_err(|e| anyhow!(e))?;
    let outcome = run(&state, cli);
    state.shutdown();
    Ok(ExitCode::from(outcome?))
}

/// 执行命令，返回进程退出码
fn run(state: &AppState, cli: CliArgs) -> Result<u8> {
    match cli.command {
        Command::Analyze { inventory } => {
            let rows = read_json_rows(&inventory)
                .with_context(|| format!("读取库存文件失败: {}", inventory.display()))?;
            let report = state.analysis_api.analyze_rows(&cli.warehouse_id, &rows)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Validate { code } => {
            let validation = state.template_api.validate_location(&cli.warehouse_id, &code)?;
            println!("{}", serde_json::to_string_pretty(&validation)?);
            if !validation.is_valid {
                return Ok(EXIT_INVALID_LOCATION);
            }
        }
        Command::Seed => {
            let inserted = state.rule_api.seed_defaults()?;
            println!("seeded_rules={}", inserted);
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_analyze_with_options() {
        let cli =
            parse_args(&args(&["analyze", "inv.json", "--warehouse", "WH01", "--db", "x.db"]))
                .unwrap();
        assert_eq!(
            cli.command,
            Command::Analyze {
                inventory: PathBuf::from("inv.json")
            }
        );
        assert_eq!(cli.warehouse_id, "WH01");
        assert_eq!(cli.db_path.as_deref(), Some("x.db"));
    }

    #[test]
    fn test_parse_validate_defaults_warehouse() {
        let cli = parse_args(&args(&["validate", "02-01-001A"])).unwrap();
        assert_eq!(
            cli.command,
            Command::Validate {
                code: "02-01-001A".to_string()
            }
        );
        assert_eq!(cli.warehouse_id, DEFAULT_WAREHOUSE);
        assert!(cli.db_path.is_none());
    }

    #[test]
    fn test_parse_rejects_unknown_command_and_missing_values() {
        assert!(parse_args(&args(&["explode"])).is_err());
        assert!(parse_args(&args(&["analyze"])).is_err());
        assert!(parse_args(&args(&["seed", "--db"])).is_err());
        assert!(parse_args(&args(&[])).is_err());
    }

    #[tokio::test]
    async fn test_run_returns_exit_code_for_validate() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();
        let mut state = AppState::new(db_path).await.unwrap();

        let valid = parse_args(&args(&["validate", "01-01-001A"])).unwrap();
        assert_eq!(run(&state, valid).unwrap(), 0);

        let invalid = parse_args(&args(&["validate", "99-01-001A"])).unwrap();
        assert_eq!(run(&state, invalid).unwrap(), EXIT_INVALID_LOCATION);

        state.shutdown();
    }
}
