//! DDC/CI monitor identification and authentication.
//!
//! Monitors expose a small vendor register map over DDC/CI (see [`vcp`]).
//! [`identify`] turns raw feature reads into a MAC address, an authorization
//! byte and the active input source. [`AuthService`] drives each connected
//! monitor through discovery and authorization and reports every state
//! change to an [`AuthSubscriber`].
//!
//! Register access goes through the [`RegisterTransport`] trait. Linux
//! builds ship an `i2c-dev` backend plus a DRM sysfs endpoint source;
//! Windows builds wrap dxva2 physical-monitor handles.

#[cfg(target_os = "linux")]
pub mod drm;
#[cfg(windows)]
pub mod dxva2;
pub mod error;
#[cfg(target_os = "linux")]
pub mod i2c;
pub mod identify;
pub mod machine;
pub mod register;
pub mod retry;
pub mod state;
pub mod vcp;

#[cfg(target_os = "linux")]
pub use drm::DrmEndpointSource;
#[cfg(windows)]
pub use dxva2::PhysicalMonitorTransport;
pub use error::{Result, TransportError};
#[cfg(target_os = "linux")]
pub use i2c::{I2cConfig, I2cDdcTransport};
pub use identify::{customer_id, MacAddress};
pub use machine::{
    AuthConfig, AuthService, AuthSubscriber, EndpointSource, HotplugEvent, HotplugKind,
};
pub use register::{FeatureValue, RegisterTransport};
pub use retry::RetryPolicy;
pub use state::{AuthState, EndpointId, FailureReason, Identity};
