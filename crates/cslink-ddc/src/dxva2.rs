use windows_sys::Win32::Devices::Display::{
    DestroyPhysicalMonitor, GetVCPFeatureAndVCPFeatureReply, SetVCPFeature,
};
use windows_sys::Win32::Foundation::{GetLastError, HANDLE};

use crate::error::{Result, TransportError};
use crate::register::{FeatureValue, RegisterTransport};

/// VCP register access through a Windows physical-monitor handle.
///
/// The handle is destroyed on drop.
pub struct PhysicalMonitorTransport {
    handle: HANDLE,
}

// SAFETY: physical monitor handles are not tied to the creating thread.
unsafe impl Send for PhysicalMonitorTransport {}

impl PhysicalMonitorTransport {
    /// Take ownership of a handle from `GetPhysicalMonitorsFromHMONITOR`.
    ///
    /// # Safety
    ///
    /// `handle` must be a live physical-monitor handle not owned elsewhere.
    pub unsafe fn from_raw(handle: HANDLE) -> Result<Self> {
        if handle.is_null() {
            return Err(TransportError::HandleInvalid);
        }
        Ok(Self { handle })
    }
}

fn last_error() -> TransportError {
    // SAFETY: reads thread-local error state only.
    TransportError::IoFailure(unsafe { GetLastError() } as i32)
}

impl RegisterTransport for PhysicalMonitorTransport {
    fn read_feature(&mut self, address: u8) -> Result<FeatureValue> {
        let mut current = 0u32;
        let mut max = 0u32;
        // SAFETY: the handle is live and both out-pointers are valid.
        let ok = unsafe {
            GetVCPFeatureAndVCPFeatureReply(
                self.handle,
                address,
                std::ptr::null_mut(),
                &mut current,
                &mut max,
            )
        };
        if ok == 0 {
            return Err(last_error());
        }
        Ok(FeatureValue { max, current })
    }

    fn write_feature(&mut self, address: u8, value: u32) -> Result<()> {
        // SAFETY: the handle is live.
        if unsafe { SetVCPFeature(self.handle, address, value) } == 0 {
            return Err(last_error());
        }
        Ok(())
    }
}

impl Drop for PhysicalMonitorTransport {
    fn drop(&mut self) {
        // SAFETY: we own the handle and never use it after this.
        unsafe {
            DestroyPhysicalMonitor(self.handle);
        }
    }
}
