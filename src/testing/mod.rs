//! The declarative `.in`/`.expected` test battery harness (spec.md §4.6,
//! §6, §8).
//!
//! Grounded on `original_source/src/test/z80/{testbattery,expectation,
//! expectationfilereader,event,state,memoryblock}.{h,cpp}` for the file
//! grammar and failure taxonomy, fused with the teacher's `cpu-validation`
//! crate idiom of a recording `Bus` plus a `check`-style comparison that
//! yields one [`Failure`] per discrepancy rather than panicking on the
//! first one. [`FailureKind`] is `expectation.h`'s `FailureType` enum
//! carried over one-to-one, with `MemptrIncorrect` added: the header omits
//! it but `expectation.cpp`'s `checkMemptr` references it, so the header
//! and implementation disagree in the original — taken as a copy-paste
//! omission in the header and fixed here rather than reproduced.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::bus::{Bus, InterruptLines};
use crate::error::Z80Error;
use crate::io::IoBus;
use crate::memory::Memory;

/// One bus transaction recorded while a test case runs (spec.md §3 Event).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub time: u32,
    pub kind: EventKind,
    pub address: u16,
    pub data: Option<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    MemoryContend,
    MemoryRead,
    MemoryWrite,
    PortContend,
    PortRead,
    PortWrite,
}

impl EventKind {
    fn code(self) -> &'static str {
        match self {
            EventKind::MemoryContend => "MC",
            EventKind::MemoryRead => "MR",
            EventKind::MemoryWrite => "MW",
            EventKind::PortContend => "PC",
            EventKind::PortRead => "PR",
            EventKind::PortWrite => "PW",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "MC" => Some(EventKind::MemoryContend),
            "MR" => Some(EventKind::MemoryRead),
            "MW" => Some(EventKind::MemoryWrite),
            "PC" => Some(EventKind::PortContend),
            "PR" => Some(EventKind::PortRead),
            "PW" => Some(EventKind::PortWrite),
            _ => None,
        }
    }
}

/// A contiguous run of expected/initial memory bytes starting at `address`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryBlock {
    pub address: u16,
    pub data: Vec<u8>,
}

/// Every architectural register the wire format carries, independent of
/// the live [`crate::cpu::z80::Z80`] (the format has no `p`/`q` fields —
/// those are execution bookkeeping, not observable state).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterState {
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub af_prime: u16,
    pub bc_prime: u16,
    pub de_prime: u16,
    pub hl_prime: u16,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub memptr: u16,
    pub i: u8,
    pub r: u8,
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,
    pub halted: bool,
}

/// One `.in` record: a name, the state to install, the T-state budget to
/// run for, and the memory to load before running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub registers: RegisterState,
    pub run_t_states: u32,
    pub memory: Vec<MemoryBlock>,
}

/// One `.expected` record: the events a correct run must produce, the
/// resulting state, and the actual T-state count spent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectedCase {
    pub name: String,
    pub events: Vec<Event>,
    pub registers: RegisterState,
    pub t_states: u32,
    pub memory: Vec<MemoryBlock>,
}

/// `expectation.h`'s `FailureType`, carried over one-to-one (see module
/// doc for the `MemptrIncorrect` fix-up). Matches the original's omission
/// of SP/PC/HALT from the checked fields — those round-trip through the
/// register-pairs/flags line for state installation but are never asserted
/// as a distinct failure kind in the source battery either.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    AfIncorrect,
    BcIncorrect,
    DeIncorrect,
    HlIncorrect,
    IxIncorrect,
    IyIncorrect,
    AfShadowIncorrect,
    BcShadowIncorrect,
    DeShadowIncorrect,
    HlShadowIncorrect,
    IIncorrect,
    RIncorrect,
    Iff1Incorrect,
    Iff2Incorrect,
    InterruptModeIncorrect,
    MemptrIncorrect,
    MemoryIncorrect,
    TStatesIncorrect,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub expected: String,
    pub actual: String,
    pub message: String,
}

impl ExpectedCase {
    /// Compare this expectation against a CPU's post-run state and memory,
    /// returning one [`Failure`] per discrepancy (spec.md §4.6).
    pub fn check(&self, cpu: &crate::cpu::z80::Z80, memory: &Memory, t_states: u32) -> Vec<Failure> {
        let mut failures = Vec::new();
        let actual = RegisterState {
            af: cpu.get_af(),
            bc: cpu.get_bc(),
            de: cpu.get_de(),
            hl: cpu.get_hl(),
            af_prime: ((cpu.a_prime as u16) << 8) | cpu.f_prime as u16,
            bc_prime: ((cpu.b_prime as u16) << 8) | cpu.c_prime as u16,
            de_prime: ((cpu.d_prime as u16) << 8) | cpu.e_prime as u16,
            hl_prime: ((cpu.h_prime as u16) << 8) | cpu.l_prime as u16,
            ix: cpu.ix,
            iy: cpu.iy,
            sp: cpu.sp,
            pc: cpu.pc,
            memptr: cpu.memptr,
            i: cpu.i,
            r: cpu.r,
            iff1: cpu.iff1,
            iff2: cpu.iff2,
            im: cpu.im,
            halted: cpu.halted,
        };

        macro_rules! check_field {
            ($field:ident, $kind:expr) => {
                if actual.$field != self.registers.$field {
                    failures.push(Failure {
                        kind: $kind,
                        expected: format!("{:#06x}", self.registers.$field),
                        actual: format!("{:#06x}", actual.$field),
                        message: String::new(),
                    });
                }
            };
        }

        check_field!(af, FailureKind::AfIncorrect);
        check_field!(bc, FailureKind::BcIncorrect);
        check_field!(de, FailureKind::DeIncorrect);
        check_field!(hl, FailureKind::HlIncorrect);
        check_field!(ix, FailureKind::IxIncorrect);
        check_field!(iy, FailureKind::IyIncorrect);
        check_field!(af_prime, FailureKind::AfShadowIncorrect);
        check_field!(bc_prime, FailureKind::BcShadowIncorrect);
        check_field!(de_prime, FailureKind::DeShadowIncorrect);
        check_field!(hl_prime, FailureKind::HlShadowIncorrect);
        check_field!(memptr, FailureKind::MemptrIncorrect);

        if actual.i != self.registers.i {
            failures.push(Failure {
                kind: FailureKind::IIncorrect,
                expected: format!("{:#04x}", self.registers.i),
                actual: format!("{:#04x}", actual.i),
                message: String::new(),
            });
        }
        if actual.r != self.registers.r {
            failures.push(Failure {
                kind: FailureKind::RIncorrect,
                expected: format!("{:#04x}", self.registers.r),
                actual: format!("{:#04x}", actual.r),
                message: String::new(),
            });
        }
        if actual.iff1 != self.registers.iff1 {
            failures.push(Failure {
                kind: FailureKind::Iff1Incorrect,
                expected: self.registers.iff1.to_string(),
                actual: actual.iff1.to_string(),
                message: String::new(),
            });
        }
        if actual.iff2 != self.registers.iff2 {
            failures.push(Failure {
                kind: FailureKind::Iff2Incorrect,
                expected: self.registers.iff2.to_string(),
                actual: actual.iff2.to_string(),
                message: String::new(),
            });
        }
        if actual.im != self.registers.im {
            failures.push(Failure {
                kind: FailureKind::InterruptModeIncorrect,
                expected: self.registers.im.to_string(),
                actual: actual.im.to_string(),
                message: String::new(),
            });
        }

        for (block_idx, block) in self.memory.iter().enumerate() {
            for (offset, &expected_byte) in block.data.iter().enumerate() {
                let addr = block.address.wrapping_add(offset as u16);
                let actual_byte = memory.read_byte(addr);
                if actual_byte != expected_byte {
                    let mut message = String::new();
                    let _ = write!(
                        message,
                        "expected byte {expected_byte:#04x} at {addr:#06x} \
                         ({:#06x} + {offset:#04x}); found {actual_byte:#04x} \
                         [memory block #{}]",
                        block.address,
                        block_idx + 1
                    );
                    failures.push(Failure {
                        kind: FailureKind::MemoryIncorrect,
                        expected: format!("{expected_byte:#04x}"),
                        actual: format!("{actual_byte:#04x}"),
                        message,
                    });
                }
            }
        }

        if t_states != self.t_states {
            failures.push(Failure {
                kind: FailureKind::TStatesIncorrect,
                expected: self.t_states.to_string(),
                actual: t_states.to_string(),
                message: String::new(),
            });
        }

        failures
    }
}

/// A joined `.in`/`.expected` pair, keyed by the record name both files
/// share (spec.md §4.6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestBatteryCase {
    pub test: TestCase,
    pub expectation: Option<ExpectedCase>,
}

/// Loads and joins a `<base>.in` / `<base>.expected` pair.
pub struct TestBattery {
    cases: HashMap<String, TestBatteryCase>,
}

impl TestBattery {
    /// Read `<base_path>.in` and `<base_path>.expected`, joining records by
    /// name (spec.md §4.6). File-parse failures surface as a [`Z80Error`]
    /// with line context; they never panic.
    pub fn load(base_path: &Path) -> Result<Self, Z80Error> {
        let in_path = base_path.with_extension("in");
        let expected_path = base_path.with_extension("expected");

        let in_text = fs::read_to_string(&in_path).map_err(|e| Z80Error::TestFileParse {
            file: in_path.display().to_string(),
            line: 0,
            message: e.to_string(),
        })?;
        let expected_text = fs::read_to_string(&expected_path).map_err(|e| Z80Error::TestFileParse {
            file: expected_path.display().to_string(),
            line: 0,
            message: e.to_string(),
        })?;

        let mut cases = HashMap::new();
        for test in parse_test_file(&in_text, &in_path.display().to_string())? {
            cases.insert(
                test.name.clone(),
                TestBatteryCase {
                    test,
                    expectation: None,
                },
            );
        }

        for expectation in parse_expected_file(&expected_text, &expected_path.display().to_string())? {
            if let Some(case) = cases.get_mut(&expectation.name) {
                case.expectation = Some(expectation);
            }
        }

        Ok(Self { cases })
    }

    pub fn count(&self) -> usize {
        self.cases.len()
    }

    pub fn cases(&self) -> impl Iterator<Item = &TestBatteryCase> {
        self.cases.values()
    }

    pub fn case(&self, name: &str) -> Option<&TestBatteryCase> {
        self.cases.get(name)
    }
}

struct LineCursor<'a> {
    lines: std::iter::Peekable<std::slice::Iter<'a, &'a str>>,
    file: &'a str,
    line_no: usize,
}

impl<'a> LineCursor<'a> {
    fn new(lines: &'a [&'a str], file: &'a str) -> Self {
        Self {
            lines: lines.iter().peekable(),
            file,
            line_no: 0,
        }
    }

    fn next_line(&mut self) -> Option<&'a str> {
        self.line_no += 1;
        self.lines.next().copied()
    }

    fn peek_line(&mut self) -> Option<&'a str> {
        self.lines.peek().copied().copied()
    }

    fn skip_blank(&mut self) {
        while matches!(self.peek_line(), Some(l) if l.trim().is_empty()) {
            self.next_line();
        }
    }

    fn error(&self, message: impl Into<String>) -> Z80Error {
        Z80Error::TestFileParse {
            file: self.file.to_string(),
            line: self.line_no,
            message: message.into(),
        }
    }

    fn expect_line(&mut self) -> Result<&'a str, Z80Error> {
        self.next_line().ok_or_else(|| self.error("unexpected end of file"))
    }
}

fn parse_hex_u16(s: &str, cursor: &LineCursor) -> Result<u16, Z80Error> {
    u16::from_str_radix(s, 16).map_err(|_| cursor.error(format!("expected 4-hex-digit word, found '{s}'")))
}

fn parse_hex_u8(s: &str, cursor: &LineCursor) -> Result<u8, Z80Error> {
    u8::from_str_radix(s, 16).map_err(|_| cursor.error(format!("expected 2-hex-digit byte, found '{s}'")))
}

fn parse_bool_flag(s: &str, cursor: &LineCursor) -> Result<bool, Z80Error> {
    match s {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(cursor.error(format!("expected 0 or 1, found '{s}'"))),
    }
}

/// Parses the register-pairs line (`AF BC DE HL AF' BC' DE' HL' IX IY SP PC
/// MEMPTR`) and the registers/flags line (`I R IFF1 IFF2 IM HALT
/// T-STATES`), returning the combined register state and trailing T-state
/// field.
fn parse_register_lines(cursor: &mut LineCursor) -> Result<(RegisterState, u32), Z80Error> {
    let pairs_line = cursor.expect_line()?;
    let words: Vec<&str> = pairs_line.split_whitespace().collect();
    if words.len() != 13 {
        return Err(cursor.error(format!(
            "register-pairs line must have 13 words, found {}",
            words.len()
        )));
    }
    let af = parse_hex_u16(words[0], cursor)?;
    let bc = parse_hex_u16(words[1], cursor)?;
    let de = parse_hex_u16(words[2], cursor)?;
    let hl = parse_hex_u16(words[3], cursor)?;
    let af_prime = parse_hex_u16(words[4], cursor)?;
    let bc_prime = parse_hex_u16(words[5], cursor)?;
    let de_prime = parse_hex_u16(words[6], cursor)?;
    let hl_prime = parse_hex_u16(words[7], cursor)?;
    let ix = parse_hex_u16(words[8], cursor)?;
    let iy = parse_hex_u16(words[9], cursor)?;
    let sp = parse_hex_u16(words[10], cursor)?;
    let pc = parse_hex_u16(words[11], cursor)?;
    let memptr = parse_hex_u16(words[12], cursor)?;

    let flags_line = cursor.expect_line()?;
    let words: Vec<&str> = flags_line.split_whitespace().collect();
    if words.len() != 7 {
        return Err(cursor.error(format!(
            "registers/flags line must have 7 words, found {}",
            words.len()
        )));
    }
    let i = parse_hex_u8(words[0], cursor)?;
    let r = parse_hex_u8(words[1], cursor)?;
    let iff1 = parse_bool_flag(words[2], cursor)?;
    let iff2 = parse_bool_flag(words[3], cursor)?;
    let im: u8 = words[4]
        .parse()
        .map_err(|_| cursor.error(format!("expected decimal IM, found '{}'", words[4])))?;
    let halted = parse_bool_flag(words[5], cursor)?;
    let t_states: u32 = words[6]
        .parse()
        .map_err(|_| cursor.error(format!("expected decimal T-states, found '{}'", words[6])))?;

    Ok((
        RegisterState {
            af,
            bc,
            de,
            hl,
            af_prime,
            bc_prime,
            de_prime,
            hl_prime,
            ix,
            iy,
            sp,
            pc,
            memptr,
            i,
            r,
            iff1,
            iff2,
            im,
            halted,
        },
        t_states,
    ))
}

/// Parses zero or more `AAAA B0 B1 B2 ... -1` memory-block lines, stopping
/// at a blank line or a line that is exactly `-1` (the record terminator).
fn parse_memory_blocks(cursor: &mut LineCursor) -> Result<Vec<MemoryBlock>, Z80Error> {
    let mut blocks = Vec::new();
    loop {
        match cursor.peek_line() {
            None => break,
            Some(line) if line.trim().is_empty() => break,
            Some(line) if line.trim() == "-1" => {
                cursor.next_line();
                break;
            }
            _ => {}
        }

        let line = cursor.expect_line()?;
        let mut words = line.split_whitespace();
        let address_word = words.next().ok_or_else(|| cursor.error("empty memory block line"))?;
        let address = parse_hex_u16(address_word, cursor)?;

        let mut data = Vec::new();
        for word in words {
            if word == "-1" {
                break;
            }
            data.push(parse_hex_u8(word, cursor)?);
        }
        blocks.push(MemoryBlock { address, data });
    }
    Ok(blocks)
}

fn parse_test_file(text: &str, file: &str) -> Result<Vec<TestCase>, Z80Error> {
    let lines: Vec<&str> = text.lines().collect();
    let mut cursor = LineCursor::new(&lines, file);
    let mut cases = Vec::new();

    loop {
        cursor.skip_blank();
        if cursor.peek_line().is_none() {
            break;
        }

        let name = cursor.expect_line()?.trim().to_string();
        let (registers, run_t_states) = parse_register_lines(&mut cursor)?;
        let memory = parse_memory_blocks(&mut cursor)?;

        cases.push(TestCase {
            name,
            registers,
            run_t_states,
            memory,
        });
    }

    Ok(cases)
}

fn parse_events(cursor: &mut LineCursor) -> Result<Vec<Event>, Z80Error> {
    let mut events = Vec::new();
    while matches!(cursor.peek_line(), Some(l) if l.starts_with(' ')) {
        let line = cursor.expect_line()?;
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() < 3 {
            return Err(cursor.error("event line must have at least a time, kind and address"));
        }
        let time: u32 = words[0]
            .parse()
            .map_err(|_| cursor.error(format!("expected decimal event time, found '{}'", words[0])))?;
        let kind = EventKind::from_code(words[1])
            .ok_or_else(|| cursor.error(format!("unrecognised event kind '{}'", words[1])))?;
        let address = parse_hex_u16(words[2], cursor)?;
        let data = match words.get(3) {
            Some(w) => Some(parse_hex_u8(w, cursor)?),
            None => None,
        };
        events.push(Event {
            time,
            kind,
            address,
            data,
        });
    }
    Ok(events)
}

fn parse_expected_file(text: &str, file: &str) -> Result<Vec<ExpectedCase>, Z80Error> {
    let lines: Vec<&str> = text.lines().collect();
    let mut cursor = LineCursor::new(&lines, file);
    let mut cases = Vec::new();

    loop {
        cursor.skip_blank();
        if cursor.peek_line().is_none() {
            break;
        }

        let name = cursor.expect_line()?.trim().to_string();
        let events = parse_events(&mut cursor)?;
        let (registers, t_states) = parse_register_lines(&mut cursor)?;
        let memory = parse_memory_blocks(&mut cursor)?;

        cases.push(ExpectedCase {
            name,
            events,
            registers,
            t_states,
            memory,
        });
    }

    Ok(cases)
}

/// A [`Bus`] that drives real [`Memory`]/[`IoBus`] while recording every
/// transaction as an [`Event`], for comparison against an
/// [`ExpectedCase`]'s event list (spec.md §4.6, §8). Time advances by the
/// cycle count passed to each contend hook, since that is the only place
/// the executor declares how long an access holds the bus.
pub struct TracingBus<'a> {
    pub memory: &'a mut Memory,
    pub io: &'a mut IoBus,
    pub events: Vec<Event>,
    pub time: u32,
    pub interrupts: InterruptLines,
}

impl<'a> TracingBus<'a> {
    pub fn new(memory: &'a mut Memory, io: &'a mut IoBus) -> Self {
        Self {
            memory,
            io,
            events: Vec::new(),
            time: 0,
            interrupts: InterruptLines::default(),
        }
    }
}

impl Bus for TracingBus<'_> {
    fn read(&mut self, address: u16) -> u8 {
        let value = self.memory.read_byte(address);
        self.events.push(Event {
            time: self.time,
            kind: EventKind::MemoryRead,
            address,
            data: Some(value),
        });
        value
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory.write_byte(address, value);
        self.events.push(Event {
            time: self.time,
            kind: EventKind::MemoryWrite,
            address,
            data: Some(value),
        });
    }

    fn contend(&mut self, address: u16, cycles: u8) {
        self.events.push(Event {
            time: self.time,
            kind: EventKind::MemoryContend,
            address,
            data: None,
        });
        self.time += cycles as u32;
    }

    fn io_read(&mut self, port: u16) -> u8 {
        let value = self.io.read(port);
        self.events.push(Event {
            time: self.time,
            kind: EventKind::PortRead,
            address: port,
            data: Some(value),
        });
        value
    }

    fn io_write(&mut self, port: u16, value: u8) {
        self.io.write(port, value);
        self.events.push(Event {
            time: self.time,
            kind: EventKind::PortWrite,
            address: port,
            data: Some(value),
        });
    }

    fn contend_port(&mut self, port: u16) {
        self.events.push(Event {
            time: self.time,
            kind: EventKind::PortContend,
            address: port,
            data: None,
        });
    }

    fn check_interrupts(&self) -> InterruptLines {
        self.interrupts
    }
}

/// Installs a [`TestCase`]'s initial register state onto a live CPU.
pub fn install_registers(cpu: &mut crate::cpu::z80::Z80, regs: &RegisterState) {
    cpu.set_af(regs.af);
    cpu.set_bc(regs.bc);
    cpu.set_de(regs.de);
    cpu.set_hl(regs.hl);
    cpu.a_prime = (regs.af_prime >> 8) as u8;
    cpu.f_prime = regs.af_prime as u8;
    cpu.b_prime = (regs.bc_prime >> 8) as u8;
    cpu.c_prime = regs.bc_prime as u8;
    cpu.d_prime = (regs.de_prime >> 8) as u8;
    cpu.e_prime = regs.de_prime as u8;
    cpu.h_prime = (regs.hl_prime >> 8) as u8;
    cpu.l_prime = regs.hl_prime as u8;
    cpu.ix = regs.ix;
    cpu.iy = regs.iy;
    cpu.sp = regs.sp;
    cpu.pc = regs.pc;
    cpu.memptr = regs.memptr;
    cpu.i = regs.i;
    cpu.r = regs.r;
    cpu.iff1 = regs.iff1;
    cpu.iff2 = regs.iff2;
    cpu.im = regs.im;
    cpu.halted = regs.halted;
}

/// Loads a [`TestCase`]'s memory blocks directly into a [`Memory`],
/// bypassing paging/ROM-write protection (test setup, not emulated access).
pub fn install_memory(memory_bytes: &mut [u8], blocks: &[MemoryBlock]) {
    for block in blocks {
        for (offset, &byte) in block.data.iter().enumerate() {
            let addr = block.address as usize + offset;
            if addr < memory_bytes.len() {
                memory_bytes[addr] = byte;
            }
        }
    }
}
