//! Reading list-view cells out of another process.
//!
//! A list-view answers `LVM_GETITEMTEXTW` by writing into buffers addressed
//! in *its own* address space, so the request descriptor and the text buffer
//! have to be allocated inside the target process. The descriptor layout
//! below is the comctl32 v6 `LVITEMW` as compiled into the target; it is an
//! unpublished contract of the target binary and has to be re-checked when
//! the target is upgraded.

use crate::platforms::AutomationEngine;
use crate::{RobotError, WindowRef};
use std::sync::Arc;
use tracing::error;

pub const LVM_FIRST: u32 = 0x1000;
pub const LVM_GETITEMCOUNT: u32 = LVM_FIRST + 4;
pub const LVM_GETITEMTEXTW: u32 = LVM_FIRST + 115;
pub const LVIF_TEXT: u32 = 0x0001;

/// Text buffer capacity in UTF-16 code units.
pub const TEXT_CAPACITY: usize = 256;

/// Pointer width of the process that owns the list-view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LvItemLayout {
    X86,
    X64,
}

impl LvItemLayout {
    pub const fn size(self) -> usize {
        match self {
            LvItemLayout::X86 => 60,
            LvItemLayout::X64 => 88,
        }
    }

    const MASK: usize = 0;
    const ITEM: usize = 4;
    const SUB_ITEM: usize = 8;

    pub const fn text_ptr_offset(self) -> usize {
        match self {
            LvItemLayout::X86 => 20,
            // 4 bytes of padding after stateMask
            LvItemLayout::X64 => 24,
        }
    }

    pub const fn text_max_offset(self) -> usize {
        match self {
            LvItemLayout::X86 => 24,
            LvItemLayout::X64 => 32,
        }
    }

    /// Serialize a text request for (`row`, `col`) whose reply goes to
    /// `text_addr` in the target process.
    pub fn encode_text_request(
        self,
        row: usize,
        col: usize,
        text_addr: u64,
        capacity: usize,
    ) -> Result<Vec<u8>, RobotError> {
        let row = i32::try_from(row)
            .map_err(|_| RobotError::PlatformError(format!("row {row} out of range")))?;
        let col = i32::try_from(col)
            .map_err(|_| RobotError::PlatformError(format!("column {col} out of range")))?;
        let capacity = i32::try_from(capacity)
            .map_err(|_| RobotError::PlatformError(format!("capacity {capacity} out of range")))?;

        let mut buf = vec![0u8; self.size()];
        put(&mut buf, Self::MASK, &LVIF_TEXT.to_le_bytes());
        put(&mut buf, Self::ITEM, &row.to_le_bytes());
        put(&mut buf, Self::SUB_ITEM, &col.to_le_bytes());
        match self {
            LvItemLayout::X86 => {
                let addr = u32::try_from(text_addr).map_err(|_| {
                    RobotError::PlatformError(format!(
                        "text buffer {text_addr:#x} not addressable by a 32-bit target"
                    ))
                })?;
                put(&mut buf, self.text_ptr_offset(), &addr.to_le_bytes());
            }
            LvItemLayout::X64 => put(&mut buf, self.text_ptr_offset(), &text_addr.to_le_bytes()),
        }
        put(&mut buf, self.text_max_offset(), &capacity.to_le_bytes());
        Ok(buf)
    }
}

fn put(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Decode the UTF-16LE reply, `chars` code units long.
pub fn decode_text(raw: &[u8], chars: usize) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .take(chars)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}

/// Best-effort reader for list-views owned by the target process.
#[derive(Clone)]
pub struct ListViewReader {
    engine: Arc<dyn AutomationEngine>,
}

impl ListViewReader {
    pub fn new(engine: Arc<dyn AutomationEngine>) -> Self {
        Self { engine }
    }

    /// Current number of rows. Zero is a normal state.
    pub fn row_count(&self, list_view: &WindowRef) -> usize {
        self.engine.list_view_item_count(list_view)
    }

    /// Text of one cell, or an empty string when there is no such cell or
    /// the cross-process read failed.
    pub fn cell_text(&self, list_view: &WindowRef, row: usize, col: usize) -> String {
        let rows = self.row_count(list_view);
        if rows == 0 || row >= rows {
            return String::new();
        }

        match self.engine.read_list_view_text(list_view, row, col) {
            Ok(text) => text,
            Err(e) => {
                error!(hwnd = list_view.hwnd, row, col, "remote list-view read failed: {e}");
                String::new()
            }
        }
    }
}
