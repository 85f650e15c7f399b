/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::question_type;

/// 初始化全局日志订阅器
///
/// 优先使用 `RUST_LOG`，未设置时使用传入的过滤规则。重复调用是安全的。
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_concurrent`: 最大并发数
/// - `actor`: 当前生效的管理员身份
pub fn log_startup(max_concurrent: usize, actor: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 问卷答卷批量处理模式");
    info!("📊 最大并发数: {}", max_concurrent);
    info!("👤 管理员身份: {} (认证未启用)", actor);
    let types: Vec<String> = question_type::all()
        .map(|d| format!("{}({})", d.key, d.label))
        .collect();
    info!("📋 已登记题型 {} 种: {}", types.len(), types.join(", "));
    info!("{}", "=".repeat(60));
}

/// 记录问卷定义加载信息
pub fn log_seed_loaded(categories: usize, questions: usize) {
    info!("✓ 已导入 {} 个分类, 共 {} 道题目", categories, questions);
}

/// 记录答卷文件加载信息
///
/// # 参数
/// - `total`: 文件总数
/// - `max_concurrent`: 最大并发数
pub fn log_files_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 个待处理的答卷文件", total);
    info!("📋 最多同时处理 {} 个\n", max_concurrent);
}

/// 打印最终统计信息
///
/// # 参数
/// - `accepted`: 已入库数量
/// - `rejected`: 校验未通过数量
/// - `failed`: 处理出错数量
/// - `export_path`: 导出文件路径
pub fn print_final_stats(accepted: usize, rejected: usize, failed: usize, export_path: &str) {
    let total = accepted + rejected + failed;
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 入库: {}/{}", accepted, total);
    info!("⚠️ 校验未通过: {}", rejected);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n导出结果已保存至: {}", export_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("你好世界", 2), "你好...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init("debug");
        init("info");
    }
}
