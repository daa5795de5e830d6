//! One-line event summaries for logs.

use std::fmt;

use super::Event;
use super::state::Section;
use super::sections::{Extended, SysParams};
use crate::kinds::Command;

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = &self.header;
        write!(f, "{}", header.event_type)?;
        if !header.dest_queue.is_empty() {
            write!(f, " q:'{}'", header.dest_queue)?;
        }
        if !header.reference.is_empty() {
            write!(f, " ref:'{}'", header.reference)?;
        }
        if !header.return_fd.is_empty() && header.return_fd != "-1" {
            write!(f, " rFd:{}", header.return_fd)?;
        }
        write_sys_params(f, &self.sys_params)?;
        write_extended(f, &self.extended)
    }
}

fn write_sys_params(f: &mut fmt::Formatter<'_>, section: &Section<SysParams>) -> fmt::Result {
    let Some(params) = section.get() else {
        return write_raw(f, "sysParams", section.raw());
    };
    if params.command != Command::None {
        write!(f, " {}", params.command)?;
    }
    let labelled = [
        ("url", &params.url),
        ("scriptName", &params.script_name),
        ("result", &params.result),
    ];
    for (label, value) in labelled {
        if !value.is_empty() {
            write!(f, " {label}:'{value}'")?;
        }
    }
    write!(f, " bSuccess:{}", u8::from(params.success))?;
    let diagnostics = [
        ("errorString", &params.error_string),
        ("failureCause", &params.failure_cause),
        ("systemParam", &params.system_param),
    ];
    for (label, value) in diagnostics {
        if !value.is_empty() {
            write!(f, " {label}:{value}")?;
        }
    }
    Ok(())
}

fn write_extended(f: &mut fmt::Formatter<'_>, section: &Section<Extended>) -> fmt::Result {
    let Some(extended) = section.get() else {
        return write_raw(f, "part2", section.raw());
    };
    if !extended.trace.is_empty() {
        write!(f, " traceB||{}||traceE", extended.trace)?;
    }
    if !extended.trace_timestamp.is_empty() {
        write!(f, " traceTS:{}", extended.trace_timestamp)?;
    }
    Ok(())
}

fn write_raw(f: &mut fmt::Formatter<'_>, label: &str, raw: Option<&[u8]>) -> fmt::Result {
    match raw {
        Some(bytes) if !bytes.is_empty() => {
            write!(f, " {label}:{}", String::from_utf8_lossy(bytes))
        }
        _ => Ok(()),
    }
}
