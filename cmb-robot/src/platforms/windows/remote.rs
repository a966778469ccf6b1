//! Reading list-view cells that live in another process.
//!
//! `LVM_GETITEMTEXTW` takes pointers, and the control dereferences them in
//! its own address space. The request descriptor and the text buffer are
//! therefore allocated inside the target process, filled and read back
//! through the process memory APIs.

use super::types::{send_message, HandleGuard, RemoteBuffer};
use crate::list_view::{decode_text, LvItemLayout, LVM_GETITEMTEXTW, TEXT_CAPACITY};
use crate::RobotError;
use std::ffi::c_void;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, WPARAM};
use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows::Win32::System::Threading::{
    IsWow64Process, OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION,
    PROCESS_VM_READ, PROCESS_VM_WRITE,
};

fn platform_error(what: &str, e: windows::core::Error) -> RobotError {
    RobotError::PlatformError(format!("{what}: {e}"))
}

/// Descriptor layout the target process expects.
fn target_layout(process: &HandleGuard) -> LvItemLayout {
    if cfg!(target_pointer_width = "32") {
        return LvItemLayout::X86;
    }
    let mut wow64 = BOOL(0);
    match unsafe { IsWow64Process(process.0, &mut wow64) } {
        Ok(()) if wow64.as_bool() => LvItemLayout::X86,
        _ => LvItemLayout::X64,
    }
}

pub(crate) fn read_cell(
    list_view: HWND,
    pid: u32,
    row: usize,
    col: usize,
) -> Result<String, RobotError> {
    let process = unsafe {
        OpenProcess(
            PROCESS_VM_OPERATION | PROCESS_VM_READ | PROCESS_VM_WRITE | PROCESS_QUERY_INFORMATION,
            false,
            pid,
        )
    }
    .map_err(|e| platform_error("OpenProcess", e))?;
    let process = HandleGuard(process);
    let layout = target_layout(&process);

    // Declared after `process` so both are released before the handle closes.
    let item = RemoteBuffer::alloc(&process, layout.size())?;
    let text = RemoteBuffer::alloc(&process, TEXT_CAPACITY * 2)?;

    let request = layout.encode_text_request(row, col, text.address(), TEXT_CAPACITY)?;
    unsafe {
        WriteProcessMemory(
            process.0,
            item.ptr(),
            request.as_ptr() as *const c_void,
            request.len().min(item.len()),
            None,
        )
    }
    .map_err(|e| platform_error("WriteProcessMemory", e))?;

    let copied = send_message(
        list_view,
        LVM_GETITEMTEXTW,
        WPARAM(row),
        LPARAM(item.ptr() as isize),
    )
    .ok_or_else(|| {
        RobotError::PlatformError("list-view did not answer LVM_GETITEMTEXTW".to_string())
    })?;
    if copied <= 0 {
        return Ok(String::new());
    }

    let chars = (copied as usize).min(TEXT_CAPACITY);
    let mut raw = vec![0u8; (chars * 2).min(text.len())];
    unsafe {
        ReadProcessMemory(
            process.0,
            text.ptr(),
            raw.as_mut_ptr() as *mut c_void,
            raw.len(),
            None,
        )
    }
    .map_err(|e| platform_error("ReadProcessMemory", e))?;

    Ok(decode_text(&raw, chars))
}
