//! Platform detection from build-time constants.
//!
//! RTOS build systems export configuration values as absolute symbols whose
//! value is the setting. The first recognised marker locks the platform;
//! markers of any other platform are ignored from then on.

use std::fmt;

use elfscope_elf::{Compiler, Symbol};
use tracing::debug;

/// Function that only exists in Zephyr images.
const ZEPHYR_SCHEDULER_INIT: &str = "z_sched_init";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Unit {
    Kilobytes,
    Bytes,
}

/// A configuration symbol to look for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Marker {
    pub symbol: &'static str,
    pub label: &'static str,
    unit: Unit,
}

impl Marker {
    const fn kb(symbol: &'static str, label: &'static str) -> Self {
        Self {
            symbol,
            label,
            unit: Unit::Kilobytes,
        }
    }

    const fn bytes(symbol: &'static str, label: &'static str) -> Self {
        Self {
            symbol,
            label,
            unit: Unit::Bytes,
        }
    }

    #[must_use]
    pub fn format(&self, value: u64) -> String {
        match self.unit {
            Unit::Kilobytes => format!("{value} KB"),
            Unit::Bytes => format!("{value} B"),
        }
    }
}

const ZEPHYR_MARKERS: [Marker; 5] = [
    Marker::kb("CONFIG_FLASH_SIZE", "Flash size"),
    Marker::kb("CONFIG_SRAM_SIZE", "SRAM size"),
    Marker::bytes("CONFIG_MAIN_STACK_SIZE", "Main stack size"),
    Marker::bytes("CONFIG_HEAP_MEM_POOL_SIZE", "Heap memory pool size"),
    Marker::bytes("CONFIG_FLASH_LOAD_SIZE", "Flash load size"),
];

const MSDK_MARKERS: [Marker; 6] = [
    Marker::bytes("Stack_Size", "Stack size"),
    Marker::bytes("Heap_Size", "Heap size"),
    Marker::bytes("ARM_SRAM_SIZE", "ARM SRAM size"),
    Marker::bytes("ARM_FLASH_SIZE", "ARM Flash size"),
    Marker::bytes("_RISCV_SRAM_SIZE", "RISC-V SRAM size"),
    Marker::bytes("_RISCV_FLASH_SIZE", "RISC-V Flash size"),
];

/// Supported firmware platforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Zephyr,
    Msdk,
}

impl Platform {
    pub const ALL: [Self; 2] = [Self::Zephyr, Self::Msdk];

    /// Markers in display order.
    #[must_use]
    pub const fn markers(self) -> &'static [Marker] {
        match self {
            Self::Zephyr => &ZEPHYR_MARKERS,
            Self::Msdk => &MSDK_MARKERS,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Zephyr => "Zephyr RTOS",
            Self::Msdk => "MSDK",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A detected configuration value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeuristicEntry {
    pub symbol: &'static str,
    pub label: &'static str,
    pub value: u64,
    /// Value with its unit, e.g. `512 KB`.
    pub display: String,
    order: usize,
}

/// Platform and configuration detected from the symbol tables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Heuristics {
    platform: Option<Platform>,
    entries: Vec<HeuristicEntry>,
    /// Compiler named in the `.comment` section.
    pub compiler: Option<Compiler>,
}

impl Heuristics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect one symbol.
    pub fn collect(&mut self, symbol: &Symbol) {
        if self.platform.is_none() && symbol.is_function() && symbol.name == ZEPHYR_SCHEDULER_INIT {
            debug!("scheduler symbol found, platform is Zephyr");
            self.platform = Some(Platform::Zephyr);
        }
        if !symbol.is_absolute() {
            return;
        }

        for platform in Platform::ALL {
            let Some(order) = platform
                .markers()
                .iter()
                .position(|m| m.symbol == symbol.name)
            else {
                continue;
            };
            match self.platform {
                None => self.platform = Some(platform),
                Some(locked) if locked != platform => {
                    debug!(
                        symbol = %symbol.name,
                        marker_platform = %platform,
                        locked = %locked,
                        "ignoring marker of another platform"
                    );
                    break;
                }
                Some(_) => {}
            }
            let marker = &platform.markers()[order];
            let entry = HeuristicEntry {
                symbol: marker.symbol,
                label: marker.label,
                value: symbol.value,
                display: marker.format(symbol.value),
                order,
            };
            debug!(label = marker.label, value = %entry.display, "heuristic");
            self.entries.retain(|e| e.symbol != entry.symbol);
            self.entries.push(entry);
            self.entries.sort_by_key(|e| e.order);
            break;
        }
    }

    #[must_use]
    pub const fn platform(&self) -> Option<Platform> {
        self.platform
    }

    /// Detected values, in the platform's marker order.
    #[must_use]
    pub fn entries(&self) -> &[HeuristicEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, symbol: &str) -> Option<&HeuristicEntry> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elfscope_elf::{SHN_ABS, STT_FUNC, STT_OBJECT, SymbolType};

    fn abs(name: &str, value: u64) -> Symbol {
        Symbol {
            name: name.to_string(),
            shndx: SHN_ABS,
            value,
            sym_type: SymbolType(STT_OBJECT),
            ..Symbol::default()
        }
    }

    #[test]
    fn test_zephyr_flash_size() {
        let mut h = Heuristics::new();
        h.collect(&abs("CONFIG_FLASH_SIZE", 512));
        assert_eq!(h.platform(), Some(Platform::Zephyr));
        let entry = h.entry("CONFIG_FLASH_SIZE").unwrap();
        assert_eq!(entry.display, "512 KB");
        assert_eq!(entry.label, "Flash size");
    }

    #[test]
    fn test_entries_sorted_by_marker_order() {
        let mut h = Heuristics::new();
        h.collect(&abs("CONFIG_MAIN_STACK_SIZE", 2048));
        h.collect(&abs("CONFIG_SRAM_SIZE", 256));
        h.collect(&abs("CONFIG_FLASH_SIZE", 1024));
        let symbols: Vec<_> = h.entries().iter().map(|e| e.symbol).collect();
        assert_eq!(
            symbols,
            ["CONFIG_FLASH_SIZE", "CONFIG_SRAM_SIZE", "CONFIG_MAIN_STACK_SIZE"]
        );
        assert_eq!(h.entries()[2].display, "2048 B");
    }

    #[test]
    fn test_other_platform_markers_ignored() {
        let mut h = Heuristics::new();
        h.collect(&abs("Stack_Size", 4096));
        h.collect(&abs("CONFIG_FLASH_SIZE", 512));
        assert_eq!(h.platform(), Some(Platform::Msdk));
        assert_eq!(h.entries().len(), 1);
        assert_eq!(h.entries()[0].display, "4096 B");
    }

    #[test]
    fn test_non_absolute_symbols_ignored() {
        let mut h = Heuristics::new();
        let mut sym = abs("CONFIG_FLASH_SIZE", 512);
        sym.shndx = 1;
        h.collect(&sym);
        assert_eq!(h.platform(), None);
        assert!(h.entries().is_empty());
    }

    #[test]
    fn test_scheduler_locks_zephyr() {
        let mut h = Heuristics::new();
        h.collect(&Symbol {
            name: "z_sched_init".into(),
            sym_type: SymbolType(STT_FUNC),
            shndx: 1,
            ..Symbol::default()
        });
        h.collect(&abs("Heap_Size", 1024));
        assert_eq!(h.platform(), Some(Platform::Zephyr));
        assert!(h.entries().is_empty());
    }
}
