//! In-memory representation of one protocol message.
//!
//! An [`Event`] built with [`Event::new`] has every section parsed and ready
//! for mutation. An event produced by the decoder has its header parsed and,
//! unless all sections were requested eagerly, keeps the other sections as raw
//! bytes. Section accessors return [`EventError::NotMaterialized`] until
//! [`Event::materialize`] or [`Event::materialize_all`] has run.

mod params;
mod sections;
mod state;
mod summary;

use std::borrow::Cow;
use std::fmt;

use crate::error::EventError;
use crate::kinds::{Command, EventType};

pub use self::sections::{ExecParams, Extended, Header, SysParams};
pub(crate) use self::state::Section;

/// Identifies one of the four sections of an event, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// Routing header.
    Header,
    /// Tracing and lifetime metadata.
    Extended,
    /// Broker-level parameters.
    SysParams,
    /// Execution parameters.
    ExecParams,
}

impl SectionKind {
    /// All sections in wire order.
    pub const ALL: [Self; 4] = [Self::Header, Self::Extended, Self::SysParams, Self::ExecParams];

    /// Returns the section name used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Extended => "extended",
            Self::SysParams => "sysParams",
            Self::ExecParams => "execParams",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    header: Header,
    header_raw: Option<Vec<u8>>,
    extended: Section<Extended>,
    sys_params: Section<SysParams>,
    exec_params: Section<ExecParams>,
}

impl Event {
    /// Builds an event of the given type with every section materialised.
    ///
    /// `success` starts out false and no parameters are set.
    #[must_use]
    pub fn new(event_type: EventType) -> Self {
        Self {
            header: Header {
                event_type,
                ..Header::default()
            },
            header_raw: None,
            extended: Section::fresh(),
            sys_params: Section::fresh(),
            exec_params: Section::fresh(),
        }
    }

    pub(crate) const fn from_parts(
        header: Header,
        header_raw: Vec<u8>,
        extended: Section<Extended>,
        sys_params: Section<SysParams>,
        exec_params: Section<ExecParams>,
    ) -> Self {
        Self {
            header,
            header_raw: Some(header_raw),
            extended,
            sys_params,
            exec_params,
        }
    }

    // -----------------------------------------------------------------------
    // Header
    // -----------------------------------------------------------------------

    /// Returns the routing header.
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the routing header for modification.
    pub fn header_mut(&mut self) -> &mut Header {
        self.header_raw = None;
        &mut self.header
    }

    /// Returns the event type.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.header.event_type
    }

    /// Sets the event type.
    pub fn set_event_type(&mut self, event_type: EventType) {
        self.header_mut().event_type = event_type;
    }

    /// Sets the event type from its numeric wire value.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidKind`] for values outside the set.
    pub fn set_event_type_value(&mut self, value: u32) -> Result<(), EventError> {
        let event_type = EventType::try_from(value)?;
        self.set_event_type(event_type);
        Ok(())
    }

    /// Returns the correlation reference.
    #[must_use]
    pub const fn reference(&self) -> &str {
        self.header.reference.as_str()
    }

    /// Sets the correlation reference.
    pub fn set_reference(&mut self, reference: impl Into<String>) {
        self.header_mut().reference = reference.into();
    }

    /// Returns the return routing token.
    #[must_use]
    pub const fn return_fd(&self) -> &str {
        self.header.return_fd.as_str()
    }

    /// Sets the return routing token.
    pub fn set_return_fd(&mut self, return_fd: impl Into<String>) {
        self.header_mut().return_fd = return_fd.into();
    }

    /// Returns true when the submitter waits for a reply on the stream socket.
    #[must_use]
    pub fn awaits_stream_reply(&self) -> bool {
        self.header.return_fd == "0"
    }

    /// Returns the destination queue.
    #[must_use]
    pub const fn dest_queue(&self) -> &str {
        self.header.dest_queue.as_str()
    }

    /// Sets the destination queue.
    pub fn set_dest_queue(&mut self, queue: impl Into<String>) {
        self.header_mut().dest_queue = queue.into();
    }

    // -----------------------------------------------------------------------
    // Optional sections
    // -----------------------------------------------------------------------

    /// Returns true when the section can be read without parsing.
    #[must_use]
    pub const fn is_materialized(&self, section: SectionKind) -> bool {
        match section {
            SectionKind::Header => true,
            SectionKind::Extended => self.extended.is_materialized(),
            SectionKind::SysParams => self.sys_params.is_materialized(),
            SectionKind::ExecParams => self.exec_params.is_materialized(),
        }
    }

    /// Parses one deferred section in place.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Section`] when the raw bytes are not valid JSON
    /// for the section. The section stays deferred in that case.
    pub fn materialize(&mut self, section: SectionKind) -> Result<(), EventError> {
        let result = match section {
            SectionKind::Header => Ok(()),
            SectionKind::Extended => self.extended.materialize(),
            SectionKind::SysParams => self.sys_params.materialize(),
            SectionKind::ExecParams => self.exec_params.materialize(),
        };
        result.map_err(|source| EventError::Section { section, source })
    }

    /// Parses every deferred section.
    ///
    /// # Errors
    ///
    /// Returns the first section parse failure.
    pub fn materialize_all(&mut self) -> Result<(), EventError> {
        for section in SectionKind::ALL {
            self.materialize(section)?;
        }
        Ok(())
    }

    /// Returns the extended section.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while the section is deferred.
    pub fn extended(&self) -> Result<&Extended, EventError> {
        self.extended
            .get()
            .ok_or(EventError::not_materialized(SectionKind::Extended))
    }

    /// Returns the extended section for modification.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while the section is deferred.
    pub fn extended_mut(&mut self) -> Result<&mut Extended, EventError> {
        self.extended
            .get_mut()
            .ok_or(EventError::not_materialized(SectionKind::Extended))
    }

    /// Returns the system parameters.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while the section is deferred.
    pub fn sys_params(&self) -> Result<&SysParams, EventError> {
        self.sys_params
            .get()
            .ok_or(EventError::not_materialized(SectionKind::SysParams))
    }

    /// Returns the system parameters for modification.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while the section is deferred.
    pub fn sys_params_mut(&mut self) -> Result<&mut SysParams, EventError> {
        self.sys_params
            .get_mut()
            .ok_or(EventError::not_materialized(SectionKind::SysParams))
    }

    /// Returns the execution parameters.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while the section is deferred.
    pub fn exec_params(&self) -> Result<&ExecParams, EventError> {
        self.exec_params
            .get()
            .ok_or(EventError::not_materialized(SectionKind::ExecParams))
    }

    /// Returns the execution parameters for modification.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while the section is deferred.
    pub fn exec_params_mut(&mut self) -> Result<&mut ExecParams, EventError> {
        self.exec_params
            .get_mut()
            .ok_or(EventError::not_materialized(SectionKind::ExecParams))
    }

    // -----------------------------------------------------------------------
    // System parameter shortcuts
    // -----------------------------------------------------------------------

    /// Returns the control command.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while system parameters are
    /// deferred.
    pub fn command(&self) -> Result<Command, EventError> {
        self.sys_params().map(|params| params.command)
    }

    /// Sets the control command.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while system parameters are
    /// deferred.
    pub fn set_command(&mut self, command: Command) -> Result<(), EventError> {
        self.sys_params_mut()?.command = command;
        Ok(())
    }

    /// Returns the success flag.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while system parameters are
    /// deferred.
    pub fn success(&self) -> Result<bool, EventError> {
        self.sys_params().map(|params| params.success)
    }

    /// Sets the success flag.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while system parameters are
    /// deferred.
    pub fn set_success(&mut self, success: bool) -> Result<(), EventError> {
        self.sys_params_mut()?.success = success;
        Ok(())
    }

    /// Sets the outcome text.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while system parameters are
    /// deferred.
    pub fn set_result(&mut self, result: impl Into<String>) -> Result<(), EventError> {
        self.sys_params_mut()?.result = result.into();
        Ok(())
    }

    /// Sets the failure description.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while system parameters are
    /// deferred.
    pub fn set_error_string(&mut self, error: impl Into<String>) -> Result<(), EventError> {
        self.sys_params_mut()?.error_string = error.into();
        Ok(())
    }

    /// Returns true when the broker asked the submitter to wait for a reply.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotMaterialized`] while system parameters are
    /// deferred.
    pub fn expect_reply(&self) -> Result<bool, EventError> {
        self.sys_params().map(|params| params.expect_reply)
    }

    // -----------------------------------------------------------------------
    // Wire access for the codec
    // -----------------------------------------------------------------------

    pub(crate) fn section_bytes(
        &self,
        section: SectionKind,
    ) -> Result<Cow<'_, [u8]>, serde_json::Error> {
        match section {
            SectionKind::Header => match &self.header_raw {
                Some(raw) => Ok(Cow::Borrowed(raw.as_slice())),
                None => serde_json::to_vec(&self.header).map(Cow::Owned),
            },
            SectionKind::Extended => self.extended.to_wire(),
            SectionKind::SysParams => self.sys_params.to_wire(),
            SectionKind::ExecParams => self.exec_params.to_wire(),
        }
    }
}
