//! Status-bar disable flags.
//!
//! While the lock surface is up, some system affordances must not be
//! re-enabled by windows that appear on top of it.

use bitflags::bitflags;

bitflags! {
    /// Status-bar features to disable. Values match the platform's
    /// `StatusBarManager.DISABLE_*` constants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusBarFlags: u32 {
        /// Pull-down expansion.
        const EXPAND = 0x0001_0000;
        /// Notification icons.
        const NOTIFICATION_ICONS = 0x0002_0000;
        /// Notification alerts.
        const NOTIFICATION_ALERTS = 0x0004_0000;
        /// Ticker.
        const NOTIFICATION_TICKER = 0x0008_0000;
        /// System info icons.
        const SYSTEM_INFO = 0x0010_0000;
        /// Home button.
        const HOME = 0x0020_0000;
        /// Back button.
        const BACK = 0x0040_0000;
        /// Clock.
        const CLOCK = 0x0080_0000;
        /// Recents button.
        const RECENT = 0x0100_0000;
        /// Search/assist gesture.
        const SEARCH = 0x0200_0000;
    }
}

/// Inputs to [`StatusBarInputs::flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusBarInputs {
    /// Lock surface is showing.
    pub showing: bool,
    /// Lock surface is covered by another surface.
    pub occluded: bool,
    /// Power-off-alarm boot.
    pub alarm_boot: bool,
    /// A lock-screen extension asked for search to be disabled.
    pub search_disabled_by_extension: bool,
    /// Extra flags requested by the anti-theft lock.
    pub anti_theft: StatusBarFlags,
}

impl StatusBarInputs {
    /// Flags to hand to the status bar.
    pub fn flags(&self) -> StatusBarFlags {
        let mut flags = StatusBarFlags::empty();

        if self.showing {
            flags |= StatusBarFlags::RECENT;
            if self.alarm_boot || self.search_disabled_by_extension {
                flags |= StatusBarFlags::SEARCH;
            }
            if !self.occluded {
                flags |= StatusBarFlags::HOME;
            }
        }

        flags | self.anti_theft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_disables_nothing() {
        assert_eq!(StatusBarInputs::default().flags(), StatusBarFlags::empty());
    }

    #[test]
    fn showing_disables_recent_and_home() {
        let inputs = StatusBarInputs { showing: true, ..Default::default() };
        assert_eq!(inputs.flags(), StatusBarFlags::RECENT | StatusBarFlags::HOME);
    }

    #[test]
    fn occluded_keeps_home() {
        let inputs = StatusBarInputs { showing: true, occluded: true, ..Default::default() };
        assert_eq!(inputs.flags(), StatusBarFlags::RECENT);
    }

    #[test]
    fn alarm_boot_disables_search() {
        let inputs = StatusBarInputs { showing: true, alarm_boot: true, ..Default::default() };
        assert!(inputs.flags().contains(StatusBarFlags::SEARCH));
    }

    #[test]
    fn anti_theft_flags_apply_even_when_hidden() {
        let inputs = StatusBarInputs {
            anti_theft: StatusBarFlags::NOTIFICATION_ICONS | StatusBarFlags::CLOCK,
            ..Default::default()
        };
        assert_eq!(inputs.flags(), StatusBarFlags::NOTIFICATION_ICONS | StatusBarFlags::CLOCK);
    }
}
