use std::collections::HashSet;

/// Messages shown at most once per process until re-armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notice {
    /// Suggest a toolchain manager when the binary is installed another way.
    ToolchainManager,
}

/// Tracks which one-time notices have already been shown.
///
/// Owned by the session registry so its lifetime is the process's. A notice
/// is re-armed with [`NoticeState::reset`] once the condition that triggered
/// it has been dealt with.
#[derive(Debug, Default)]
pub struct NoticeState {
    shown: HashSet<Notice>,
}

impl NoticeState {
    /// Returns true the first time it is asked about `notice`, and marks it shown.
    pub fn should_show(&mut self, notice: Notice) -> bool {
        self.shown.insert(notice)
    }

    pub fn reset(&mut self, notice: Notice) {
        self.shown.remove(&notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_is_shown_once() {
        let mut notices = NoticeState::default();
        assert!(notices.should_show(Notice::ToolchainManager));
        assert!(!notices.should_show(Notice::ToolchainManager));
    }

    #[test]
    fn reset_rearms_notice() {
        let mut notices = NoticeState::default();
        assert!(notices.should_show(Notice::ToolchainManager));
        notices.reset(Notice::ToolchainManager);
        assert!(notices.should_show(Notice::ToolchainManager));
    }
}
