//! Guest memory implementations: a flat 64 KiB RAM and a banked store
//! with a guest-address mapping table and an optional write-back cache.

use tracing::trace;

use crate::traits::GUEST_SPACE;
use crate::{CoreError, MemoryMapper, Result};

/// Upper bound on the host backing store: 1 MiB across all banks.
pub const HOST_SPACE: usize = 0x100000;
/// Bank count used by [`BankedMemory::default`].
pub const DEFAULT_BANK_COUNT: usize = 4;
/// Bank size used by [`BankedMemory::default`]: 16 KiB.
pub const DEFAULT_BANK_SIZE: usize = 0x4000;

const CACHE_SIZE: usize = 256;
const CACHE_FLUSH_PERIOD: u32 = 1_000;

/// Flat guest memory covering the whole 16-bit space.
pub struct Ram {
    bytes: [u8; GUEST_SPACE],
}

impl Ram {
    pub fn new() -> Self {
        Self {
            bytes: [0; GUEST_SPACE],
        }
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMapper for Ram {
    fn read(&mut self, addr: u16) -> Result<u8> {
        Ok(self.bytes[addr as usize])
    }
    fn write(&mut self, addr: u16, value: u8) -> Result<()> {
        self.bytes[addr as usize] = value;
        Ok(())
    }
    fn peek(&self, addr: u16) -> Result<u8> {
        Ok(self.bytes[addr as usize])
    }
}

/// One entry in the guest-address mapping table.
#[derive(Copy, Clone, Debug)]
struct BankMapping {
    bank: u8,
    base: u16,
    size: u16,
    read_only: bool,
}

impl BankMapping {
    fn contains(&self, addr: u16) -> bool {
        (addr as u32) >= self.base as u32 && (addr as u32) < self.base as u32 + self.size as u32
    }

    fn overlaps(&self, base: u16, size: u32) -> bool {
        let lo = self.base as u32;
        let hi = lo + self.size as u32;
        let other_lo = base as u32;
        let other_hi = other_lo + size;
        lo < other_hi && other_lo < hi
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct CacheEntry {
    addr: u16,
    value: u8,
    valid: bool,
    dirty: bool,
}

/// A banked guest memory: up to 256 fixed-size banks behind the 16-bit
/// space. A mapping table pins bank windows at guest base addresses;
/// addresses no mapping covers fall through to the current bank.
///
/// An optional direct-mapped write-back cache sits in front of the banks.
/// It is flushed on every bank switch and on a periodic counter tick, and
/// its presence never changes observable results.
pub struct BankedMemory {
    banks: Vec<Box<[u8]>>,
    bank_size: usize,
    current: u8,
    mappings: Vec<BankMapping>,
    // Cache state; `cache` stays empty when the cache is disabled.
    cache: Vec<CacheEntry>,
    cache_hits: u64,
    cache_misses: u64,
    cache_accesses: u32,
}

impl BankedMemory {
    /// Create `num_banks` zeroed banks of `bank_size` bytes each. The
    /// combined size may not exceed the 1 MiB backing store.
    pub fn new(num_banks: usize, bank_size: usize) -> Result<Self> {
        if num_banks == 0 || num_banks > 256 || bank_size == 0 || num_banks * bank_size > HOST_SPACE
        {
            return Err(CoreError::MemoryAccessViolation(format!(
                "{num_banks} banks of {bank_size:#X} bytes do not fit the backing store"
            )));
        }
        Ok(Self {
            banks: (0..num_banks)
                .map(|_| vec![0u8; bank_size].into_boxed_slice())
                .collect(),
            bank_size,
            current: 0,
            mappings: Vec::new(),
            cache: Vec::new(),
            cache_hits: 0,
            cache_misses: 0,
            cache_accesses: 0,
        })
    }

    /// Enable the direct-mapped write-back cache.
    pub fn with_cache(mut self) -> Self {
        self.cache = vec![CacheEntry::default(); CACHE_SIZE];
        self
    }

    /// Map `bank` read-write at guest base address `base`. The window
    /// spans one full bank; overlapping windows and windows running past
    /// the top of the guest space are rejected.
    pub fn map(&mut self, base: u16, bank: u8) -> Result<()> {
        self.map_with(base, bank, false)
    }

    /// Map `bank` read-only at guest base address `base`. Writes into the
    /// window fault.
    pub fn map_read_only(&mut self, base: u16, bank: u8) -> Result<()> {
        self.map_with(base, bank, true)
    }

    fn map_with(&mut self, base: u16, bank: u8, read_only: bool) -> Result<()> {
        self.check_bank(bank)?;
        let size = self.bank_size as u32;
        if base as u32 + size > 0xFFFF {
            return Err(CoreError::MemoryAccessViolation(format!(
                "mapping at {base:#06X} runs past the top of guest memory"
            )));
        }
        for mapping in &self.mappings {
            if mapping.overlaps(base, size) {
                return Err(CoreError::MemoryAccessViolation(format!(
                    "mapping at {base:#06X} overlaps the window at {:#06X}",
                    mapping.base
                )));
            }
        }
        // Cached lines were resolved under the old mapping table.
        self.invalidate_cache()?;
        trace!(base, bank, read_only, "bank mapped");
        self.mappings.push(BankMapping {
            bank,
            base,
            size: size as u16,
            read_only,
        });
        Ok(())
    }

    /// Change the bank backing unmapped guest addresses. Buffered writes
    /// in the outgoing bank are committed first.
    pub fn switch_bank(&mut self, bank: u8) -> Result<()> {
        self.check_bank(bank)?;
        self.invalidate_cache()?;
        trace!(old = self.current, new = bank, "bank switch");
        self.current = bank;
        Ok(())
    }

    pub fn current_bank(&self) -> u8 {
        self.current
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses
    }

    /// Write every dirty cache entry back to its bank.
    pub fn flush(&mut self) -> Result<()> {
        for index in 0..self.cache.len() {
            if self.cache[index].valid && self.cache[index].dirty {
                let (bank, offset, _) = self.resolve(self.cache[index].addr)?;
                self.banks[bank][offset] = self.cache[index].value;
                self.cache[index].dirty = false;
            }
        }
        Ok(())
    }

    /// Write back and drop every cache line. Lines resolved under an old
    /// bank selection or mapping table would otherwise go stale.
    fn invalidate_cache(&mut self) -> Result<()> {
        self.flush()?;
        for entry in &mut self.cache {
            entry.valid = false;
        }
        Ok(())
    }

    fn check_bank(&self, bank: u8) -> Result<()> {
        if (bank as usize) < self.banks.len() {
            Ok(())
        } else {
            Err(CoreError::MemoryAccessViolation(format!(
                "bank {bank} out of range"
            )))
        }
    }

    /// Resolve a guest address to `(bank index, offset, read_only)`. The
    /// first mapping containing the address wins; otherwise the current
    /// bank backs it, provided the address fits the bank.
    fn resolve(&self, addr: u16) -> Result<(usize, usize, bool)> {
        for mapping in &self.mappings {
            if mapping.contains(addr) {
                return Ok((
                    mapping.bank as usize,
                    (addr - mapping.base) as usize,
                    mapping.read_only,
                ));
            }
        }
        if (addr as usize) >= self.bank_size {
            return Err(CoreError::MemoryAccessViolation(format!(
                "{addr:#06X} is outside the current bank"
            )));
        }
        Ok((self.current as usize, addr as usize, false))
    }

    fn tick_cache(&mut self) -> Result<()> {
        self.cache_accesses += 1;
        if self.cache_accesses >= CACHE_FLUSH_PERIOD {
            self.cache_accesses = 0;
            self.flush()?;
        }
        Ok(())
    }
}

impl Default for BankedMemory {
    fn default() -> Self {
        // The default geometry always fits, so construction cannot fail.
        match Self::new(DEFAULT_BANK_COUNT, DEFAULT_BANK_SIZE) {
            Ok(memory) => memory,
            Err(_) => unreachable!(),
        }
    }
}

impl MemoryMapper for BankedMemory {
    fn read(&mut self, addr: u16) -> Result<u8> {
        let (bank, offset, _) = self.resolve(addr)?;
        if self.cache.is_empty() {
            return Ok(self.banks[bank][offset]);
        }
        let index = addr as usize & (CACHE_SIZE - 1);
        if self.cache[index].valid && self.cache[index].addr == addr {
            self.cache_hits += 1;
            let value = self.cache[index].value;
            self.tick_cache()?;
            return Ok(value);
        }
        self.cache_misses += 1;
        if self.cache[index].valid && self.cache[index].dirty {
            let (evicted_bank, evicted_offset, _) = self.resolve(self.cache[index].addr)?;
            self.banks[evicted_bank][evicted_offset] = self.cache[index].value;
        }
        let value = self.banks[bank][offset];
        self.cache[index] = CacheEntry {
            addr,
            value,
            valid: true,
            dirty: false,
        };
        self.tick_cache()?;
        Ok(value)
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<()> {
        let (bank, offset, read_only) = self.resolve(addr)?;
        if read_only {
            return Err(CoreError::MemoryAccessViolation(format!(
                "write to read-only mapping at {addr:#06X}"
            )));
        }
        if self.cache.is_empty() {
            self.banks[bank][offset] = value;
            return Ok(());
        }
        let index = addr as usize & (CACHE_SIZE - 1);
        if self.cache[index].valid && self.cache[index].dirty && self.cache[index].addr != addr {
            let (evicted_bank, evicted_offset, _) = self.resolve(self.cache[index].addr)?;
            self.banks[evicted_bank][evicted_offset] = self.cache[index].value;
        }
        self.cache[index] = CacheEntry {
            addr,
            value,
            valid: true,
            dirty: true,
        };
        self.tick_cache()
    }

    fn peek(&self, addr: u16) -> Result<u8> {
        if !self.cache.is_empty() {
            let index = addr as usize & (CACHE_SIZE - 1);
            if self.cache[index].valid && self.cache[index].addr == addr {
                return Ok(self.cache[index].value);
            }
        }
        let (bank, offset, _) = self.resolve(addr)?;
        Ok(self.banks[bank][offset])
    }
}
