//! 展示层接口 - 业务能力层
//!
//! 编排逻辑只通过这个 trait 与界面交互：提示消息、忙碌状态、结果渲染、重试按钮

use tracing::{debug, error, info, warn};

use crate::workflow::AggregateView;

/// 提示消息级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// 展示层
pub trait Presenter: Send + Sync {
    /// 显示一条提示消息
    fn show_message(&self, level: MessageLevel, text: &str);

    /// 切换操作按钮的忙碌状态
    fn set_busy(&self, busy: bool);

    /// 渲染当前的结果视图
    fn render(&self, view: &AggregateView);

    /// 显示一次失败事件（每个失败事件只调用一次）
    fn show_error(&self, text: &str);

    /// 显示 / 隐藏"重试失败文件"按钮
    fn set_retry_visible(&self, visible: bool);
}

/// 忙碌状态守卫
///
/// 创建时进入忙碌状态，离开作用域时一定会恢复，包括所有错误路径
pub struct BusyGuard<'a> {
    presenter: &'a dyn Presenter,
}

impl<'a> BusyGuard<'a> {
    pub fn new(presenter: &'a dyn Presenter) -> Self {
        presenter.set_busy(true);
        Self { presenter }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.presenter.set_busy(false);
    }
}

/// 终端展示层，全部输出到日志
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    verbose: bool,
}

impl ConsolePresenter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Presenter for ConsolePresenter {
    fn show_message(&self, level: MessageLevel, text: &str) {
        match level {
            MessageLevel::Info => info!("{}", text),
            MessageLevel::Success => info!("✓ {}", text),
            MessageLevel::Warning => warn!("⚠️ {}", text),
            MessageLevel::Error => error!("❌ {}", text),
        }
    }

    fn set_busy(&self, busy: bool) {
        debug!("操作按钮状态: {}", if busy { "分析中..." } else { "分析开始" });
    }

    fn render(&self, view: &AggregateView) {
        if self.verbose {
            info!("\n{}", view.render_text());
        } else {
            info!(
                "📄 当前结果: {} 个文件 (失败 {} 个)",
                view.len(),
                view.failed_count()
            );
        }
    }

    fn show_error(&self, text: &str) {
        error!("❌ {}", text);
    }

    fn set_retry_visible(&self, visible: bool) {
        if visible {
            info!("🔁 存在失败的文件，可以重试");
        } else {
            debug!("重试按钮已隐藏");
        }
    }
}
