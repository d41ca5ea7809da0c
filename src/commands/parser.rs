//! CLI 命令行参数解析和路由
//!
//! 使用 clap 定义命令行接口并进行参数解析

use crate::config::DEFAULT_LOG_TAIL_LINES;
use clap::{Parser, Subcommand};
use std::ffi::OsString;

/// kvctl - KoalaqVision 服务的启动、停止与状态管理
#[derive(Parser, Debug, Clone)]
#[command(
    name = "kvctl",
    about = "Service supervisor for the KoalaqVision API and its vector database",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// 输出调试日志（-vv 输出全部 trace）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// 交互式菜单（无参数时的默认行为）
    #[command(hide = true)]
    Menu,

    /// 后台启动服务（必要时先启动向量数据库）
    Start {
        /// 服务已在运行时直接重启，不再确认
        #[arg(short = 'y', long)]
        yes: bool,
        /// 向量数据库未就绪时放弃启动
        #[arg(long = "strict-deps")]
        strict_deps: bool,
    },

    /// 前台运行服务，Ctrl-C 结束
    #[command(name = "fg", alias = "foreground")]
    Foreground {
        /// 向量数据库未就绪时放弃启动
        #[arg(long = "strict-deps")]
        strict_deps: bool,
    },

    /// 停止服务和向量数据库
    Stop {
        /// 保持向量数据库运行
        #[arg(long = "keep-deps")]
        keep_deps: bool,
    },

    /// 重启服务（向量数据库保持运行）
    Restart,

    /// 显示服务状态
    Status {
        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },

    /// 查看服务日志
    Logs {
        /// 显示最后 N 行
        #[arg(short = 'n', long = "lines", default_value_t = DEFAULT_LOG_TAIL_LINES)]
        lines: usize,
        /// 持续输出新日志
        #[arg(short, long)]
        follow: bool,
    },

    /// 显示访问地址
    Urls,
}

impl Cli {
    /// 解析命令行参数（失败时由 clap 处理错误输出和退出）
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Subcommand to run; no subcommand means the interactive menu.
    pub fn into_command(self) -> Commands {
        self.command.unwrap_or(Commands::Menu)
    }

    /// 尝试解析命令行参数（用于测试或自定义 argv）
    pub fn try_parse_command_from<I, T>(iter: I) -> Result<Commands, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Cli::try_parse_from(iter)?.into_command())
    }
}

impl Commands {
    /// Read-only reports still run on defaults when the configuration is broken.
    pub fn tolerates_invalid_config(&self) -> bool {
        matches!(self, Commands::Status { .. } | Commands::Urls)
    }
}
