//! Loads statically linked RV64 ELF executables into a fresh core.

use goblin::elf::header::EM_RISCV;
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use log::debug;
use rvemu_core::{Core, Host, MemoryError};
use thiserror::Error;

/// Symbols marking the end of the loaded data, in order of preference.
const END_SYMBOLS: [&str; 3] = ["_end", "end", "_edata"];

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("unable to parse ELF: {0}")]
    Parse(#[from] goblin::error::Error),
    #[error("not a 64-bit little-endian RISC-V executable")]
    UnsupportedTarget,
    #[error("segment at {address:#x} reaches past the end of the file")]
    Truncated { address: u64 },
    #[error("segment at {address:#x} doesn't fit in guest memory: {source}")]
    Segment {
        address: u64,
        #[source]
        source: MemoryError,
    },
}

/// Copies every loadable segment of `image` into the core's memory, points `pc` at the entry
/// point and seeds the heap break.
pub fn load<H: Host>(core: &mut Core<H>, image: &[u8]) -> Result<(), LoadError> {
    let elf = Elf::parse(image)?;
    if !elf.is_64 || !elf.little_endian || elf.header.e_machine != EM_RISCV {
        return Err(LoadError::UnsupportedTarget);
    }

    let mut highest_end = 0;
    for header in elf.program_headers.iter().filter(|h| h.p_type == PT_LOAD) {
        let address = header.p_vaddr;
        let bytes = image
            .get(header.file_range())
            .ok_or(LoadError::Truncated { address })?;
        core.memory_mut()
            .write_segment(address, header.p_memsz as usize, bytes)
            .map_err(|source| LoadError::Segment { address, source })?;
        highest_end = highest_end.max(address + header.p_memsz.max(header.p_filesz));
    }

    let data_end = END_SYMBOLS
        .iter()
        .find_map(|&name| {
            elf.syms
                .iter()
                .find(|sym| elf.strtab.get_at(sym.st_name) == Some(name))
                .map(|sym| sym.st_value)
        })
        .unwrap_or(highest_end);
    let heap_start = data_end.next_multiple_of(8);
    debug!(
        "entry point {:#x}, heap starts at {heap_start:#x}",
        elf.entry
    );

    core.memory_mut().set_heap_start(heap_start);
    *core.registers_mut().pc_mut() = elf.entry;
    Ok(())
}
