use crate::flashing::FlashError;

/// Describes the flash layout of a device: equally sized erase pages grouped
/// into independently erasable and keyed instances.
///
/// All address math is done with shifts and masks derived from the sizes, so
/// the translation functions are total; addresses outside the device flash
/// wrap through the masks. Operations validate their ranges before relying
/// on the translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    base: u32,
    total_size: u32,
    instance_size: u32,
    page_size: u32,
    write_granularity: u32,
    erased_byte_value: u8,
}

/// A run of consecutive pages inside a single flash instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    /// Index of the instance the pages belong to.
    pub instance: u32,
    /// First affected page, counted within the instance.
    pub first_page: u32,
    /// Number of affected pages.
    pub pages: u32,
}

impl FlashGeometry {
    /// Create a new flash layout description.
    ///
    /// The total size must be an exact multiple of the instance size and the
    /// instance size an exact multiple of the page size. Violations are
    /// reported as an error instead of producing a layout that silently maps
    /// addresses to the wrong pages.
    pub fn new(
        base: u32,
        total_size: u32,
        instance_size: u32,
        page_size: u32,
        write_granularity: u32,
        erased_byte_value: u8,
    ) -> Result<Self, FlashError> {
        if page_size == 0 || !page_size.is_power_of_two() {
            return Err(FlashError::InvalidGeometry {
                reason: "page size is not a power of two",
            });
        }
        if instance_size < page_size || !instance_size.is_power_of_two() {
            return Err(FlashError::InvalidGeometry {
                reason: "instance size is not a power-of-two multiple of the page size",
            });
        }
        if total_size == 0 || total_size % instance_size != 0 {
            return Err(FlashError::InvalidGeometry {
                reason: "total size is not a multiple of the instance size",
            });
        }
        if !(total_size / instance_size).is_power_of_two() {
            return Err(FlashError::InvalidGeometry {
                reason: "number of instances is not a power of two",
            });
        }
        if write_granularity == 0 || !write_granularity.is_power_of_two() {
            return Err(FlashError::InvalidGeometry {
                reason: "write granularity is not a power of two",
            });
        }
        if base.checked_add(total_size).is_none() {
            return Err(FlashError::InvalidGeometry {
                reason: "flash range exceeds the 32 bit address space",
            });
        }

        Ok(FlashGeometry {
            base,
            total_size,
            instance_size,
            page_size,
            write_granularity,
            erased_byte_value,
        })
    }

    /// First address of the flash.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Total flash size in bytes.
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    /// Size of one erase page in bytes.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of independently erasable instances.
    pub fn instance_count(&self) -> u32 {
        self.total_size / self.instance_size
    }

    /// Smallest possible write, in bytes.
    pub fn write_granularity(&self) -> u32 {
        self.write_granularity
    }

    /// The value flash bytes read as after an erase.
    pub fn erased_byte_value(&self) -> u8 {
        self.erased_byte_value
    }

    /// The instance `address` belongs to.
    pub fn instance_of(&self, address: u32) -> u32 {
        (address.wrapping_sub(self.base) >> self.instance_shift()) & (self.instance_count() - 1)
    }

    /// The page `address` belongs to, counted within its instance.
    pub fn page_in_instance(&self, address: u32) -> u32 {
        (address.wrapping_sub(self.base) >> self.page_shift()) & (self.pages_per_instance() - 1)
    }

    /// The page `address` belongs to, counted over the whole flash.
    pub fn absolute_page(&self, address: u32) -> u32 {
        address.wrapping_sub(self.base) >> self.page_shift()
    }

    /// Whether `length` bytes starting at `address` lie entirely inside the
    /// flash.
    pub fn contains_range(&self, address: u32, length: u32) -> bool {
        let Some(end) = address.checked_add(length) else {
            return false;
        };
        address >= self.base && end <= self.base + self.total_size
    }

    /// The pages covered by `length` bytes starting at `address`, split into
    /// one run per instance.
    ///
    /// An empty range covers no pages. The range must lie inside the device
    /// flash, see [`FlashGeometry::contains_range`].
    pub fn page_ranges(&self, address: u32, length: u32) -> Vec<PageRange> {
        if length == 0 {
            return Vec::new();
        }

        let first = self.absolute_page(address);
        let last = self.absolute_page(address + length - 1);
        let pages_per_instance = self.pages_per_instance();

        let mut ranges = Vec::new();
        let mut page = first;
        while page <= last {
            let instance = page / pages_per_instance;
            let last_of_instance = (instance + 1) * pages_per_instance - 1;
            let run_last = last.min(last_of_instance);

            ranges.push(PageRange {
                instance,
                first_page: page % pages_per_instance,
                pages: run_last - page + 1,
            });

            page = run_last + 1;
        }
        ranges
    }

    fn pages_per_instance(&self) -> u32 {
        self.instance_size / self.page_size
    }

    fn page_shift(&self) -> u32 {
        self.page_size.trailing_zeros()
    }

    fn instance_shift(&self) -> u32 {
        self.instance_size.trailing_zeros()
    }
}
