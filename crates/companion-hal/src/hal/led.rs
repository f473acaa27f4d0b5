// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::HalResult;

/// Addressable LED strip with a buffered frame
///
/// `set_pixel` only touches the buffer; nothing is visible until `flush`.
pub trait LedDriver: Send {
    /// Number of pixels on the strip
    fn pixel_count(&self) -> usize;

    /// Set one buffered pixel
    ///
    /// # Arguments
    /// * `index` - Pixel index, `0..pixel_count()`
    /// * `r`, `g`, `b` - Channel values
    fn set_pixel(&mut self, index: usize, r: u8, g: u8, b: u8) -> HalResult<()>;

    /// Push the buffered frame to the physical strip (blocking)
    fn flush(&mut self) -> HalResult<()>;
}

impl<T: LedDriver + ?Sized> LedDriver for Box<T> {
    fn pixel_count(&self) -> usize {
        (**self).pixel_count()
    }

    fn set_pixel(&mut self, index: usize, r: u8, g: u8, b: u8) -> HalResult<()> {
        (**self).set_pixel(index, r, g, b)
    }

    fn flush(&mut self) -> HalResult<()> {
        (**self).flush()
    }
}
