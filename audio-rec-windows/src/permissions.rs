//! Windows microphone privacy check.
//!
//! On Windows 10 1803+, microphone access is controlled by the privacy
//! settings at Settings > Privacy > Microphone. Desktop apps are generally
//! allowed unless the user has disabled the global toggle.
//!
//! Unlike macOS TCC, there's no per-app consent dialog for unpackaged desktop apps.
//! Packaged apps (MSIX/UWP) get an automatic consent prompt.

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_rec_core::{CaptureError, StreamFormat};

use crate::device_enumerator::DeviceEnumerator;
use crate::error::{WasapiError, WasapiResultExt};

const E_ACCESSDENIED: i32 = 0x8007_0005_u32 as i32;
const AUDCLNT_E_DEVICE_IN_USE: i32 = 0x8889_000A_u32 as i32;

/// Outcome of opening a capture endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicrophoneAccess {
    /// The endpoint opened; this is its shared-mode mix format.
    Granted(StreamFormat),
    /// The privacy toggle blocks microphone access.
    Denied,
    /// Another application holds the endpoint exclusively.
    InUse,
    NoDevice,
}

impl MicrophoneAccess {
    /// Map a non-granted outcome onto the session error it causes.
    pub fn into_result(self) -> Result<StreamFormat, CaptureError> {
        match self {
            MicrophoneAccess::Granted(format) => Ok(format),
            MicrophoneAccess::Denied => Err(CaptureError::PermissionDenied),
            MicrophoneAccess::InUse | MicrophoneAccess::NoDevice => Err(CaptureError::DeviceUnavailable),
        }
    }
}

/// Check microphone access by activating an `IAudioClient` on the endpoint.
///
/// If activation fails with `E_ACCESSDENIED`, microphone permission is
/// disabled in Windows Privacy Settings.
pub fn check_microphone_access(device_id: Option<&str>) -> Result<MicrophoneAccess, CaptureError> {
    unsafe {
        CoInitializeEx(None, COINIT_MULTITHREADED)
            .ok()
            .map_err(|e| CaptureError::Unknown(format!("CoInitializeEx failed: {}", e)))?;

        let result = open_endpoint(device_id);

        CoUninitialize();
        result.map_err(CaptureError::from)
    }
}

unsafe fn open_endpoint(device_id: Option<&str>) -> Result<MicrophoneAccess, WasapiError> {
    let enumerator = DeviceEnumerator::new()?;
    let device = match enumerator.capture_device(device_id) {
        Ok(device) => device,
        Err(WasapiError::NoEndpoint) => return Ok(MicrophoneAccess::NoDevice),
        Err(e) => return Err(e),
    };

    let audio_client: IAudioClient = match device.Activate(CLSCTX_ALL, None) {
        Ok(client) => client,
        Err(e) => {
            return match e.code().0 {
                E_ACCESSDENIED => Ok(MicrophoneAccess::Denied),
                AUDCLNT_E_DEVICE_IN_USE => Ok(MicrophoneAccess::InUse),
                _ => Err(WasapiError::Call {
                    call: "IMMDevice::Activate",
                    source: e,
                }),
            };
        }
    };

    let mix_format_ptr = audio_client.GetMixFormat().call("GetMixFormat")?;
    let mix_format = &*mix_format_ptr;
    let format = StreamFormat::new(mix_format.nSamplesPerSec, mix_format.nChannels);
    CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));

    Ok(MicrophoneAccess::Granted(format))
}
