//! Batched multi-interface activation
//!
//! One call to the runtime's activation entry point creates the object and
//! asks it for every requested interface at once. Results come back in
//! request order, one record per interface.

use crate::config::LibraryConfig;
use crate::core::{ClsCtx, ForeignGuid, Guid, HResult};
use crate::errors::{OleError, Result};
use crate::interop::{CoServerInfo, ForeignString, MultiQi, ObjectKind, ObjectRef, Platform, SystemPlatform};
use crate::logging::{self, perf};
use smallvec::SmallVec;
use std::ptr;

/// Where an object is activated
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServerTarget {
    #[default]
    Local,
    Remote(String),
}

impl ServerTarget {
    /// An empty host is local
    pub fn from_host(host: &str) -> Self {
        if host.is_empty() {
            Self::Local
        } else {
            Self::Remote(host.to_string())
        }
    }

    /// Host to pass to the runtime, `None` when activating locally
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Remote(host) if !host.is_empty() => Some(host),
            _ => None,
        }
    }

    pub fn context(&self) -> ClsCtx {
        match self.host() {
            Some(_) => ClsCtx::REMOTE_SERVER,
            None => ClsCtx::SERVER,
        }
    }
}

/// Outcome of one interface request
#[derive(Debug)]
pub struct InterfaceResult {
    pub iid: Guid,
    /// The reference the runtime handed back, now owned by the caller
    pub interface: Option<ObjectRef>,
    pub status: HResult,
}

impl InterfaceResult {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok() && self.interface.is_some()
    }

    /// Collapse to a single interface
    ///
    /// S_OK with no pointer is `CreationFailed`. A failing status is
    /// `InterfaceRequestFailed`, and any pointer that came with it is released.
    pub fn into_result(self) -> Result<ObjectRef> {
        match (self.status.is_ok(), self.interface) {
            (true, Some(interface)) => Ok(interface),
            (true, None) => Err(OleError::CreationFailed),
            (false, stray) => {
                if let Some(interface) = stray {
                    interface.release();
                }
                Err(OleError::InterfaceRequestFailed {
                    iid: self.iid,
                    hr: self.status,
                })
            }
        }
    }
}

/// Results in request order
pub type InterfaceResults = SmallVec<[InterfaceResult; 4]>;

/// Drives activation through a platform layer
pub struct Activator<P: Platform> {
    platform: P,
    default_target: ServerTarget,
}

impl Activator<SystemPlatform> {
    /// Activator over the real runtime
    pub fn system(config: &LibraryConfig) -> Result<Self> {
        Ok(Self::new(SystemPlatform::from_config(config)?))
    }
}

impl<P: Platform> Activator<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            default_target: ServerTarget::Local,
        }
    }

    /// Target used by [`Activator::create`]
    pub fn with_default_target(mut self, target: ServerTarget) -> Self {
        self.default_target = target;
        self
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn default_target(&self) -> &ServerTarget {
        &self.default_target
    }

    /// Activate `class` and request every interface in `interfaces` in one call
    ///
    /// A non-S_OK status from the call itself fails the whole operation; any
    /// pointer the runtime still wrote into a record is released first.
    /// Otherwise each record's status and pointer are returned as reported.
    pub fn activate_multi(&self, class: &Guid, interfaces: &[Guid], target: &ServerTarget) -> Result<InterfaceResults> {
        if interfaces.is_empty() {
            return Err(OleError::NoInterfacesRequested);
        }
        let _perf = perf::track("activate_multi");

        let context = target.context();
        // Freed when this scope ends, on every path
        let host = match target.host() {
            Some(name) => Some(ForeignString::new(&self.platform, name)?),
            None => None,
        };
        let server = CoServerInfo {
            name: host.as_ref().map_or(ptr::null_mut(), ForeignString::as_ptr),
            ..CoServerInfo::local()
        };

        let foreign_class = class.to_foreign();
        let iids: SmallVec<[ForeignGuid; 4]> = interfaces.iter().map(Guid::to_foreign).collect();
        let mut records: SmallVec<[MultiQi; 4]> = iids.iter().map(|iid| MultiQi::request(iid)).collect();

        logging::log_activation_call(class, context, target.host(), interfaces.len());

        // SAFETY: `iids` and `host` outlive the call
        let hr = unsafe {
            self.platform
                .activate_instance(&foreign_class, context, &server, &mut records)
        };
        drop(host);

        if !hr.is_ok() {
            logging::log_activation_failed(class, hr);
            for record in &records {
                // SAFETY: a non-null record pointer carries a reference for the caller
                if let Some(orphan) = unsafe { ObjectRef::from_raw(record.interface, ObjectKind::Unknown) } {
                    orphan.release();
                }
            }
            return Err(OleError::ActivationFailed { hr });
        }

        let results = records
            .iter()
            .zip(interfaces)
            .map(|(record, iid)| {
                logging::log_interface_result(iid, record.hr, !record.interface.is_null());
                // SAFETY: each non-null pointer carries a reference for the caller
                let interface = unsafe { ObjectRef::from_raw(record.interface, ObjectKind::for_interface(iid)) };
                if record.hr.is_ok() && interface.is_none() {
                    logging::log_null_interface(iid);
                }
                InterfaceResult {
                    iid: *iid,
                    interface,
                    status: record.hr,
                }
            })
            .collect();
        Ok(results)
    }

    /// Single interface, activated locally
    pub fn create_local(&self, class: &Guid, iid: &Guid) -> Result<ObjectRef> {
        self.create_on(&ServerTarget::Local, class, iid)
    }

    /// Single interface on `host`; an empty host activates locally
    pub fn create_remote(&self, host: &str, class: &Guid, iid: &Guid) -> Result<ObjectRef> {
        self.create_on(&ServerTarget::from_host(host), class, iid)
    }

    /// Single interface on the default target
    pub fn create(&self, class: &Guid, iid: &Guid) -> Result<ObjectRef> {
        self.create_on(&self.default_target, class, iid)
    }

    fn create_on(&self, target: &ServerTarget, class: &Guid, iid: &Guid) -> Result<ObjectRef> {
        self.activate_multi(class, core::slice::from_ref(iid), target)?
            .into_iter()
            .next()
            .ok_or(OleError::CreationFailed)?
            .into_result()
    }

    /// Parse identifier text with the runtime's own parser (braced registry form)
    pub fn iid_from_string(&self, text: &str) -> Result<Guid> {
        let text = ForeignString::new(&self.platform, text)?;
        self.platform
            .iid_from_string(text.as_bstr())
            .map(Guid::from)
            .map_err(|hr| OleError::IdentifierParse { hr })
    }
}
