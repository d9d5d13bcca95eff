//! Memory barriers between control block stores and channel activation.
//!
//! The engine reads control blocks straight from memory. Stores to a
//! control block must land before the channel's `ACTIVE` bit is set.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        #[inline(always)]
        pub(crate) fn data_sync() {
            // Safety: barrier only. No memory or register side effects.
            unsafe { core::arch::asm!("dsb sy", options(nostack, preserves_flags)) }
        }
    } else if #[cfg(all(target_arch = "arm", target_feature = "v7"))] {
        #[inline(always)]
        pub(crate) fn data_sync() {
            // Safety: barrier only. No memory or register side effects.
            unsafe { core::arch::asm!("dsb", options(nostack, preserves_flags)) }
        }
    } else {
        #[inline(always)]
        pub(crate) fn data_sync() {
            core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
        }
    }
}
