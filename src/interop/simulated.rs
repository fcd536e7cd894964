//! In-process stand-in for the foreign runtime
//!
//! Models activation against a class registry, BSTR allocation with the real
//! length-prefixed layout, SAFEARRAY storage with the runtime's copy-on-read
//! rules, and VARIANT clearing. Failures are injected per call site, and every
//! activation call is logged so tests can assert on what crossed the boundary.

use super::platform::{ArrayBounds, ArrayHandle, Bstr, Platform};
use super::raw::{CoServerInfo, IUnknown, IUnknownVtbl, MultiQi, RawVariant, VariantPayload};
use super::string::read_bstr;
use crate::core::{ClsCtx, ForeignGuid, Guid, HResult, VarType, IID_IUNKNOWN};
use crate::logging::trace;
use core::ffi::c_void;
use core::fmt;
use core::ptr;
use core::sync::atomic::{AtomicU32, Ordering};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Objects
// ============================================================================

#[repr(C)]
struct ObjectCell {
    base: IUnknown,
    refs: AtomicU32,
    over_releases: AtomicU32,
    interfaces: Vec<Guid>,
}

// SAFETY: `base.vtbl` points at a static table and the counters are atomic
unsafe impl Send for ObjectCell {}
unsafe impl Sync for ObjectCell {}

static OBJECT_VTBL: IUnknownVtbl = IUnknownVtbl {
    query_interface: object_query_interface,
    add_ref: object_add_ref,
    release: object_release,
};

unsafe extern "system" fn object_query_interface(
    this: *mut IUnknown,
    riid: *const ForeignGuid,
    out: *mut *mut c_void,
) -> HResult {
    if out.is_null() {
        return HResult::E_POINTER;
    }
    *out = ptr::null_mut();
    if riid.is_null() {
        return HResult::E_INVALIDARG;
    }
    let cell = &*(this as *const ObjectCell);
    let iid = Guid::from_foreign(&*riid);
    if iid == IID_IUNKNOWN || cell.interfaces.contains(&iid) {
        cell.refs.fetch_add(1, Ordering::AcqRel);
        *out = this.cast();
        HResult::S_OK
    } else {
        HResult::E_NOINTERFACE
    }
}

unsafe extern "system" fn object_add_ref(this: *mut IUnknown) -> u32 {
    let cell = &*(this as *const ObjectCell);
    cell.refs.fetch_add(1, Ordering::AcqRel) + 1
}

// Never frees; the memory belongs to the SimulatedObject handles
unsafe extern "system" fn object_release(this: *mut IUnknown) -> u32 {
    let cell = &*(this as *const ObjectCell);
    let previous = match cell
        .refs
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
    {
        Ok(n) | Err(n) => n,
    };
    if previous == 0 {
        cell.over_releases.fetch_add(1, Ordering::AcqRel);
    }
    previous.saturating_sub(1)
}

/// A foreign object with a real IUnknown method table and an observable count
///
/// Starts with one reference. Reaching zero does not free the object, so
/// tests can keep inspecting it; releasing past zero is recorded instead.
#[derive(Clone)]
pub struct SimulatedObject(Arc<ObjectCell>);

impl SimulatedObject {
    pub fn new() -> Self {
        Self::with_interfaces(&[])
    }

    /// Object that also answers QueryInterface for `interfaces`
    pub fn with_interfaces(interfaces: &[Guid]) -> Self {
        Self(Arc::new(ObjectCell {
            base: IUnknown { vtbl: &OBJECT_VTBL },
            refs: AtomicU32::new(1),
            over_releases: AtomicU32::new(0),
            interfaces: interfaces.to_vec(),
        }))
    }

    #[inline]
    pub fn as_raw(&self) -> *mut IUnknown {
        Arc::as_ptr(&self.0) as *mut IUnknown
    }

    pub fn ref_count(&self) -> u32 {
        self.0.refs.load(Ordering::Acquire)
    }

    /// Release was called with the count already at zero
    pub fn over_released(&self) -> bool {
        self.0.over_releases.load(Ordering::Acquire) > 0
    }

    pub fn is(&self, ptr: *mut IUnknown) -> bool {
        self.as_raw() == ptr
    }
}

impl Default for SimulatedObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimulatedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimulatedObject({:p}, refs={})", self.as_raw(), self.ref_count())
    }
}

#[inline]
unsafe fn add_ref(ptr: *mut IUnknown) {
    if !ptr.is_null() {
        ((*(*ptr).vtbl).add_ref)(ptr);
    }
}

#[inline]
unsafe fn release(ptr: *mut IUnknown) {
    if !ptr.is_null() {
        ((*(*ptr).vtbl).release)(ptr);
    }
}

// ============================================================================
// Runtime state
// ============================================================================

/// One activation call as the runtime saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationCall {
    pub class: Guid,
    pub context: ClsCtx,
    /// Server name, `None` for local activation
    pub host: Option<String>,
    pub interfaces: Vec<Guid>,
}

/// Scripted answer for one interface of a registered class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceOutcome {
    Fail(HResult),
    /// S_OK with a null pointer
    NullSuccess,
}

#[derive(Clone, Default)]
struct ClassEntry {
    interfaces: Vec<Guid>,
    outcomes: HashMap<Guid, InterfaceOutcome>,
}

#[derive(Clone)]
enum Storage {
    /// Scalars, BSTRs and interface pointers, one payload per element
    Values(Vec<VariantPayload>),
    Variants(Vec<RawVariant>),
}

struct SimArray {
    kind: VarType,
    bounds: Vec<ArrayBounds>,
    storage: Storage,
}

#[derive(Clone, Copy)]
enum Element {
    Value(VariantPayload),
    Variant(RawVariant),
}

#[derive(Default)]
struct Faults {
    string_allocation: bool,
    array_allocation: bool,
    activation: Option<HResult>,
    activation_status: Option<HResult>,
    next_array_writes: Vec<(i32, HResult)>,
    reads: HashMap<(usize, i32), HResult>,
    writes: HashMap<(usize, i32), HResult>,
    queries: HashMap<usize, HResult>,
}

#[derive(Default)]
struct State {
    next_handle: usize,
    strings: HashMap<usize, *mut [u32]>,
    arrays: HashMap<usize, SimArray>,
    classes: HashMap<Guid, ClassEntry>,
    objects: Vec<SimulatedObject>,
    calls: Vec<ActivationCall>,
    faults: Faults,
    element_reads: usize,
    variant_clears: usize,
}

// SAFETY: the raw pointers held here are only dereferenced under the lock
unsafe impl Send for State {}

const NULL_PAYLOAD: VariantPayload = VariantPayload { record: [0; 2] };

impl State {
    fn next_address(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle * 16
    }

    // ---- strings

    fn alloc_string(&mut self, units: &[u16]) -> Option<*mut u16> {
        let bytes = u32::try_from(units.len() * 2).ok()?;
        // Prefix word, the characters, a terminating NUL
        let words = 1 + (bytes as usize + 2 + 3) / 4;
        let mut block = vec![0u32; words].into_boxed_slice();
        block[0] = bytes;
        let raw = Box::into_raw(block);
        // SAFETY: `raw` spans `words` u32s, enough for the prefix, the units and a NUL
        let data = unsafe {
            let data = (raw as *mut u32).add(1) as *mut u16;
            ptr::copy_nonoverlapping(units.as_ptr(), data, units.len());
            data
        };
        self.strings.insert(data as usize, raw);
        Some(data)
    }

    unsafe fn duplicate_string(&mut self, bstr: *mut u16) -> *mut u16 {
        if bstr.is_null() {
            return ptr::null_mut();
        }
        let units: Vec<u16> = read_bstr(bstr).encode_utf16().collect();
        self.alloc_string(&units).unwrap_or(ptr::null_mut())
    }

    fn free_string(&mut self, bstr: *mut u16) -> bool {
        match self.strings.remove(&(bstr as usize)) {
            // SAFETY: the block came from Box::into_raw in alloc_string
            Some(raw) => {
                drop(unsafe { Box::from_raw(raw) });
                true
            }
            None => false,
        }
    }

    // ---- arrays

    fn create_array(&mut self, kind: VarType, bounds: Vec<ArrayBounds>) -> Option<ArrayHandle> {
        if self.faults.array_allocation || kind.element_size().is_none() {
            return None;
        }
        let total = bounds.iter().map(ArrayBounds::len).product::<usize>();
        let storage = if kind == VarType::VARIANT {
            Storage::Variants(vec![RawVariant::empty(); total])
        } else {
            Storage::Values(vec![NULL_PAYLOAD; total])
        };
        let address = self.next_address();
        self.arrays.insert(address, SimArray { kind, bounds, storage });
        for (index, hr) in self.faults.next_array_writes.drain(..) {
            self.faults.writes.insert((address, index), hr);
        }
        // SAFETY: the address is a registry key, never dereferenced
        unsafe { ArrayHandle::from_raw(address as *mut c_void) }
    }

    fn slot(&self, address: usize, index: i32) -> Result<(VarType, usize, Element), HResult> {
        let array = self.arrays.get(&address).ok_or(HResult::E_INVALIDARG)?;
        let [bounds] = array.bounds.as_slice() else {
            return Err(HResult::DISP_E_BADINDEX);
        };
        let offset = i64::from(index) - i64::from(bounds.lower);
        if offset < 0 || offset >= i64::from(bounds.count) {
            return Err(HResult::DISP_E_BADINDEX);
        }
        let slot = offset as usize;
        let element = match &array.storage {
            Storage::Values(values) => Element::Value(values[slot]),
            Storage::Variants(variants) => Element::Variant(variants[slot]),
        };
        Ok((array.kind, slot, element))
    }

    unsafe fn read_element(&mut self, address: usize, index: i32, out: *mut c_void) -> Result<(), HResult> {
        self.element_reads += 1;
        if let Some(hr) = self.faults.reads.get(&(address, index)) {
            return Err(*hr);
        }
        let (kind, _, element) = self.slot(address, index)?;
        match element {
            Element::Variant(variant) => {
                let copy = self.copy_variant(&variant)?;
                (out as *mut RawVariant).write(copy);
            }
            Element::Value(payload) => match kind {
                VarType::BSTR => {
                    let copy = self.duplicate_string(payload.bstr);
                    (out as *mut *mut u16).write_unaligned(copy);
                }
                VarType::UNKNOWN | VarType::DISPATCH => {
                    add_ref(payload.unknown);
                    (out as *mut *mut IUnknown).write_unaligned(payload.unknown);
                }
                _ => {
                    let size = kind.element_size().unwrap_or(0);
                    ptr::copy_nonoverlapping(&payload as *const VariantPayload as *const u8, out as *mut u8, size);
                }
            },
        }
        Ok(())
    }

    unsafe fn write_element(&mut self, address: usize, index: i32, value: *const c_void) -> Result<(), HResult> {
        if let Some(hr) = self.faults.writes.get(&(address, index)) {
            return Err(*hr);
        }
        let (kind, slot, old) = self.slot(address, index)?;
        let new = match old {
            Element::Variant(_) => Element::Variant(self.copy_variant(&*(value as *const RawVariant))?),
            Element::Value(_) => Element::Value(match kind {
                VarType::BSTR => VariantPayload {
                    bstr: self.duplicate_string(value as *mut u16),
                },
                VarType::UNKNOWN | VarType::DISPATCH => {
                    add_ref(value as *mut IUnknown);
                    VariantPayload {
                        unknown: value as *mut IUnknown,
                    }
                }
                _ => {
                    let mut payload = NULL_PAYLOAD;
                    let size = kind.element_size().unwrap_or(0);
                    ptr::copy_nonoverlapping(value as *const u8, &mut payload as *mut VariantPayload as *mut u8, size);
                    payload
                }
            }),
        };

        if let Some(array) = self.arrays.get_mut(&address) {
            match (&mut array.storage, new) {
                (Storage::Values(values), Element::Value(payload)) => values[slot] = payload,
                (Storage::Variants(variants), Element::Variant(variant)) => variants[slot] = variant,
                _ => return Err(HResult::E_UNEXPECTED),
            }
        }
        self.dispose(kind, old)
    }

    unsafe fn dispose(&mut self, kind: VarType, element: Element) -> Result<(), HResult> {
        match element {
            Element::Variant(mut variant) => self.clear_variant(&mut variant),
            Element::Value(payload) => {
                match kind {
                    VarType::BSTR => {
                        self.free_string(payload.bstr);
                    }
                    VarType::UNKNOWN | VarType::DISPATCH => release(payload.unknown),
                    _ => {}
                }
                Ok(())
            }
        }
    }

    unsafe fn copy_variant(&mut self, source: &RawVariant) -> Result<RawVariant, HResult> {
        let mut copy = *source;
        if source.vt.is_byref() {
            return Ok(copy);
        }
        if source.vt.is_array() {
            if !source.payload.array.is_null() {
                copy.payload.array = self.copy_array(source.payload.array as usize)?.as_raw();
            }
            return Ok(copy);
        }
        match source.vt {
            VarType::BSTR => copy.payload.bstr = self.duplicate_string(source.payload.bstr),
            VarType::UNKNOWN | VarType::DISPATCH => add_ref(source.payload.unknown),
            _ => {}
        }
        Ok(copy)
    }

    unsafe fn clear_variant(&mut self, variant: &mut RawVariant) -> Result<(), HResult> {
        let vt = variant.vt;
        if !vt.is_byref() {
            if vt.is_array() {
                if !variant.payload.array.is_null() {
                    self.destroy_array(variant.payload.array as usize)?;
                }
            } else {
                match vt {
                    VarType::BSTR => {
                        self.free_string(variant.payload.bstr);
                    }
                    VarType::UNKNOWN | VarType::DISPATCH => release(variant.payload.unknown),
                    _ => {}
                }
            }
        }
        *variant = RawVariant::empty();
        Ok(())
    }

    fn copy_array(&mut self, address: usize) -> Result<ArrayHandle, HResult> {
        let (kind, bounds, storage) = {
            let array = self.arrays.get(&address).ok_or(HResult::E_INVALIDARG)?;
            (array.kind, array.bounds.clone(), array.storage.clone())
        };
        if self.faults.array_allocation {
            return Err(HResult::E_OUTOFMEMORY);
        }
        let storage = match storage {
            Storage::Variants(variants) => {
                let mut copies = Vec::with_capacity(variants.len());
                for variant in &variants {
                    copies.push(unsafe { self.copy_variant(variant)? });
                }
                Storage::Variants(copies)
            }
            Storage::Values(mut values) => {
                for payload in values.iter_mut() {
                    match kind {
                        VarType::BSTR => payload.bstr = unsafe { self.duplicate_string(payload.bstr) },
                        VarType::UNKNOWN | VarType::DISPATCH => unsafe { add_ref(payload.unknown) },
                        _ => {}
                    }
                }
                Storage::Values(values)
            }
        };
        let copy = self.next_address();
        self.arrays.insert(copy, SimArray { kind, bounds, storage });
        // SAFETY: registry key
        unsafe { ArrayHandle::from_raw(copy as *mut c_void) }.ok_or(HResult::E_UNEXPECTED)
    }

    fn destroy_array(&mut self, address: usize) -> Result<(), HResult> {
        let array = self.arrays.remove(&address).ok_or(HResult::E_INVALIDARG)?;
        match array.storage {
            Storage::Variants(variants) => {
                for mut variant in variants {
                    unsafe { self.clear_variant(&mut variant)? };
                }
            }
            Storage::Values(values) => {
                for payload in values {
                    unsafe { self.dispose(array.kind, Element::Value(payload))? };
                }
            }
        }
        Ok(())
    }

    fn query_fault(&self, address: usize) -> Result<(), HResult> {
        match self.faults.queries.get(&address) {
            Some(hr) => Err(*hr),
            None => Ok(()),
        }
    }
}

impl Drop for State {
    fn drop(&mut self) {
        for (_, raw) in self.strings.drain() {
            // SAFETY: every block came from Box::into_raw in alloc_string
            drop(unsafe { Box::from_raw(raw) });
        }
    }
}

// ============================================================================
// Platform
// ============================================================================

/// Deterministic platform for tests and benchmarks
#[derive(Default)]
pub struct SimulatedPlatform {
    state: Mutex<State>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `class` activatable; it answers IUnknown plus `interfaces`
    pub fn register_class(&self, class: Guid, interfaces: &[Guid]) {
        let mut state = self.state.lock();
        let entry = state.classes.entry(class).or_default();
        entry.interfaces = interfaces.to_vec();
    }

    /// Script the answer for one interface of a registered class
    pub fn set_interface_outcome(&self, class: Guid, iid: Guid, outcome: InterfaceOutcome) {
        let mut state = self.state.lock();
        state.classes.entry(class).or_default().outcomes.insert(iid, outcome);
    }

    /// Make every activation call fail with `hr`
    pub fn fail_activation(&self, hr: Option<HResult>) {
        self.state.lock().faults.activation = hr;
    }

    /// Fill the records as usual but report `hr` for the call itself
    pub fn report_activation_status(&self, hr: Option<HResult>) {
        self.state.lock().faults.activation_status = hr;
    }

    pub fn fail_string_allocation(&self, fail: bool) {
        self.state.lock().faults.string_allocation = fail;
    }

    /// Covers vector creation and array copies
    pub fn fail_array_allocation(&self, fail: bool) {
        self.state.lock().faults.array_allocation = fail;
    }

    pub fn fail_element_read(&self, array: ArrayHandle, index: i32, hr: HResult) {
        self.state.lock().faults.reads.insert((array.as_raw() as usize, index), hr);
    }

    pub fn fail_element_write(&self, array: ArrayHandle, index: i32, hr: HResult) {
        self.state.lock().faults.writes.insert((array.as_raw() as usize, index), hr);
    }

    /// Writes to `index` of the next array created fail with `hr`
    pub fn fail_next_array_write(&self, index: i32, hr: HResult) {
        self.state.lock().faults.next_array_writes.push((index, hr));
    }

    /// Element-kind and bounds queries on `array` fail with `hr`
    pub fn fail_array_query(&self, array: ArrayHandle, hr: HResult) {
        self.state.lock().faults.queries.insert(array.as_raw() as usize, hr);
    }

    /// Array with any number of dimensions
    pub fn create_array(&self, kind: VarType, bounds: &[ArrayBounds]) -> Option<ArrayHandle> {
        self.state.lock().create_array(kind, bounds.to_vec())
    }

    /// One-dimensional array of plain values. `T` must have the width of `kind`.
    pub fn array_from_values<T: Copy>(&self, kind: VarType, lower: i32, values: &[T]) -> Option<ArrayHandle> {
        if kind.element_size() != Some(core::mem::size_of::<T>())
            || kind == VarType::VARIANT
            || kind == VarType::BSTR
            || kind.is_object()
        {
            return None;
        }
        let count = u32::try_from(values.len()).ok()?;
        let mut state = self.state.lock();
        let array = state.create_array(kind, vec![ArrayBounds { lower, count }])?;
        for (i, value) in values.iter().enumerate() {
            let index = lower.wrapping_add(i as i32);
            // SAFETY: `value` is one element of `kind`'s width
            unsafe { state.write_element(array.as_raw() as usize, index, value as *const T as *const c_void) }.ok()?;
        }
        Some(array)
    }

    /// One-dimensional variant array that takes ownership of `values`
    pub fn array_from_variants(&self, lower: i32, values: Vec<RawVariant>) -> Option<ArrayHandle> {
        let count = u32::try_from(values.len()).ok()?;
        let mut state = self.state.lock();
        let array = state.create_array(VarType::VARIANT, vec![ArrayBounds { lower, count }])?;
        if let Some(stored) = state.arrays.get_mut(&(array.as_raw() as usize)) {
            stored.storage = Storage::Variants(values);
        }
        Some(array)
    }

    /// Foreign string the caller owns
    pub fn string(&self, text: &str) -> *mut u16 {
        self.alloc_string(text).map_or(ptr::null_mut(), Bstr::as_ptr)
    }

    pub fn live_strings(&self) -> usize {
        self.state.lock().strings.len()
    }

    pub fn live_arrays(&self) -> usize {
        self.state.lock().arrays.len()
    }

    pub fn is_live(&self, array: ArrayHandle) -> bool {
        self.state.lock().arrays.contains_key(&(array.as_raw() as usize))
    }

    pub fn activation_calls(&self) -> Vec<ActivationCall> {
        self.state.lock().calls.clone()
    }

    /// Objects created by successful activations, oldest first
    pub fn created_objects(&self) -> Vec<SimulatedObject> {
        self.state.lock().objects.clone()
    }

    /// Element reads attempted, including injected failures
    pub fn element_reads(&self) -> usize {
        self.state.lock().element_reads
    }

    pub fn variant_clears(&self) -> usize {
        self.state.lock().variant_clears
    }
}

impl Platform for SimulatedPlatform {
    unsafe fn activate_instance(
        &self,
        class: &ForeignGuid,
        context: ClsCtx,
        server: &CoServerInfo,
        results: &mut [MultiQi],
    ) -> HResult {
        let mut state = self.state.lock();
        let class = Guid::from_foreign(class);
        let host = (!server.name.is_null()).then(|| read_bstr(server.name));
        let interfaces: Vec<Guid> = results
            .iter()
            .map(|record| {
                if record.iid.is_null() {
                    Guid::NIL
                } else {
                    Guid::from_foreign(&*record.iid)
                }
            })
            .collect();
        state.calls.push(ActivationCall {
            class,
            context,
            host,
            interfaces: interfaces.clone(),
        });

        if let Some(hr) = state.faults.activation {
            return hr;
        }
        if results.is_empty() {
            return HResult::E_INVALIDARG;
        }
        let entry = match state.classes.get(&class) {
            Some(entry) => entry.clone(),
            None => return HResult::REGDB_E_CLASSNOTREG,
        };

        // Once the object exists the call succeeds; per-interface outcomes live in the records
        let object = SimulatedObject::with_interfaces(&entry.interfaces);
        for (record, iid) in results.iter_mut().zip(&interfaces) {
            let (interface, hr) = match entry.outcomes.get(iid) {
                Some(InterfaceOutcome::Fail(hr)) => (ptr::null_mut(), *hr),
                Some(InterfaceOutcome::NullSuccess) => (ptr::null_mut(), HResult::S_OK),
                None => {
                    let mut out: *mut c_void = ptr::null_mut();
                    let hr = object_query_interface(object.as_raw(), &iid.to_foreign(), &mut out);
                    (out as *mut IUnknown, hr)
                }
            };
            record.interface = interface;
            record.hr = hr;
        }
        // Drop the creation reference; what remains belongs to the records
        object_release(object.as_raw());
        trace!(class = %class, refs = object.ref_count(), "Simulated activation");
        state.objects.push(object);
        state.faults.activation_status.unwrap_or(HResult::S_OK)
    }

    fn iid_from_string(&self, text: Bstr) -> Result<ForeignGuid, HResult> {
        let state = self.state.lock();
        if !state.strings.contains_key(&(text.as_ptr() as usize)) {
            return Err(HResult::E_INVALIDARG);
        }
        // SAFETY: checked live above
        let text = unsafe { read_bstr(text.as_ptr()) };
        let inner = text
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or(HResult::E_INVALIDARG)?;
        inner
            .parse::<Guid>()
            .map(|id| id.to_foreign())
            .map_err(|_| HResult::E_INVALIDARG)
    }

    fn alloc_string(&self, text: &str) -> Option<Bstr> {
        let mut state = self.state.lock();
        if state.faults.string_allocation {
            return None;
        }
        let units: Vec<u16> = text.encode_utf16().collect();
        let ptr = state.alloc_string(&units)?;
        // SAFETY: freshly allocated above
        unsafe { Bstr::from_raw(ptr) }
    }

    fn free_string(&self, text: Bstr) {
        self.state.lock().free_string(text.as_ptr());
    }

    fn array_create_vector(&self, kind: VarType, lower_bound: i32, length: u32) -> Option<ArrayHandle> {
        self.state.lock().create_array(
            kind,
            vec![ArrayBounds {
                lower: lower_bound,
                count: length,
            }],
        )
    }

    fn array_copy(&self, array: ArrayHandle) -> Result<ArrayHandle, HResult> {
        self.state.lock().copy_array(array.as_raw() as usize)
    }

    fn array_destroy(&self, array: ArrayHandle) -> Result<(), HResult> {
        self.state.lock().destroy_array(array.as_raw() as usize)
    }

    fn array_dimensions(&self, array: ArrayHandle) -> u32 {
        let state = self.state.lock();
        state
            .arrays
            .get(&(array.as_raw() as usize))
            .map_or(0, |a| a.bounds.len() as u32)
    }

    fn array_element_kind(&self, array: ArrayHandle) -> Result<VarType, HResult> {
        let state = self.state.lock();
        let address = array.as_raw() as usize;
        state.query_fault(address)?;
        state
            .arrays
            .get(&address)
            .map(|a| a.kind)
            .ok_or(HResult::E_INVALIDARG)
    }

    fn array_bounds(&self, array: ArrayHandle, dimension: u32) -> Result<ArrayBounds, HResult> {
        let state = self.state.lock();
        let address = array.as_raw() as usize;
        state.query_fault(address)?;
        let stored = state.arrays.get(&address).ok_or(HResult::E_INVALIDARG)?;
        stored
            .bounds
            .get(dimension as usize)
            .copied()
            .ok_or(HResult::DISP_E_BADINDEX)
    }

    unsafe fn array_get_element(&self, array: ArrayHandle, index: i32, out: *mut c_void) -> Result<(), HResult> {
        self.state.lock().read_element(array.as_raw() as usize, index, out)
    }

    unsafe fn array_put_element(&self, array: ArrayHandle, index: i32, value: *const c_void) -> Result<(), HResult> {
        self.state.lock().write_element(array.as_raw() as usize, index, value)
    }

    unsafe fn variant_clear(&self, value: &mut RawVariant) -> Result<(), HResult> {
        let mut state = self.state.lock();
        state.variant_clears += 1;
        state.clear_variant(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_counts() {
        let object = SimulatedObject::new();
        unsafe {
            add_ref(object.as_raw());
            assert_eq!(object.ref_count(), 2);
            release(object.as_raw());
            release(object.as_raw());
        }
        assert_eq!(object.ref_count(), 0);
        assert!(!object.over_released());
        unsafe { release(object.as_raw()) };
        assert!(object.over_released());
    }

    #[test]
    fn test_string_layout() {
        let platform = SimulatedPlatform::new();
        let bstr = platform.string("abc");
        unsafe {
            let prefix = (bstr as *const u8).sub(4) as *const u32;
            assert_eq!(prefix.read_unaligned(), 6);
            assert_eq!(*bstr.add(3), 0);
        }
        platform.free_string(unsafe { Bstr::from_raw(bstr) }.unwrap());
        assert_eq!(platform.live_strings(), 0);
    }

    #[test]
    fn test_read_copies_strings() {
        let platform = SimulatedPlatform::new();
        let array = platform.array_create_vector(VarType::BSTR, 0, 1).unwrap();
        let text = platform.string("x");
        unsafe {
            platform.array_put_element(array, 0, text as *const c_void).unwrap();
            let mut out: *mut u16 = ptr::null_mut();
            platform.array_get_element(array, 0, &mut out as *mut _ as *mut c_void).unwrap();
            assert_ne!(out, text);
            assert_eq!(read_bstr(out), "x");
            platform.free_string(Bstr::from_raw(out).unwrap());
            platform.free_string(Bstr::from_raw(text).unwrap());
        }
        assert_eq!(platform.live_strings(), 1);
        platform.array_destroy(array).unwrap();
        assert_eq!(platform.live_strings(), 0);
    }

    #[test]
    fn test_bounds_and_bad_index() {
        let platform = SimulatedPlatform::new();
        let array = platform.array_from_values(VarType::I4, 5, &[1i32, 2, 3]).unwrap();
        assert_eq!(platform.array_bounds(array, 0), Ok(ArrayBounds { lower: 5, count: 3 }));
        assert_eq!(platform.array_bounds(array, 1), Err(HResult::DISP_E_BADINDEX));

        let mut out = 0i32;
        unsafe {
            platform.array_get_element(array, 7, &mut out as *mut i32 as *mut c_void).unwrap();
            assert_eq!(out, 3);
            assert_eq!(
                platform.array_get_element(array, 0, &mut out as *mut i32 as *mut c_void),
                Err(HResult::DISP_E_BADINDEX)
            );
        }
    }

    #[test]
    fn test_clear_destroys_nested_array() {
        let platform = SimulatedPlatform::new();
        let object = SimulatedObject::new();
        let inner = platform
            .array_from_variants(0, vec![RawVariant::from_unknown(object.as_raw())])
            .unwrap();
        unsafe { add_ref(object.as_raw()) };
        assert_eq!(object.ref_count(), 2);

        let mut outer = RawVariant::from_array(VarType::VARIANT, inner.as_raw());
        unsafe { platform.variant_clear(&mut outer).unwrap() };
        assert_eq!(outer.vt, VarType::EMPTY);
        assert!(!platform.is_live(inner));
        assert_eq!(object.ref_count(), 1);
    }

    #[test]
    fn test_unregistered_class() {
        let platform = SimulatedPlatform::new();
        let iid = IID_IUNKNOWN.to_foreign();
        let mut records = [MultiQi::request(&iid)];
        let hr = unsafe {
            platform.activate_instance(&Guid::NIL.to_foreign(), ClsCtx::SERVER, &CoServerInfo::local(), &mut records)
        };
        assert_eq!(hr, HResult::REGDB_E_CLASSNOTREG);
        assert_eq!(platform.activation_calls().len(), 1);
    }

    #[test]
    fn test_write_fault_targets_next_array_only() {
        let platform = SimulatedPlatform::new();
        platform.fail_next_array_write(0, HResult::E_FAIL);
        let first = platform.array_create_vector(VarType::I4, 0, 1).unwrap();
        let second = platform.array_create_vector(VarType::I4, 0, 1).unwrap();
        let value = 9i32;
        unsafe {
            assert_eq!(
                platform.array_put_element(first, 0, &value as *const i32 as *const c_void),
                Err(HResult::E_FAIL)
            );
            assert_eq!(platform.array_put_element(second, 0, &value as *const i32 as *const c_void), Ok(()));
        }
        platform.array_destroy(first).unwrap();
        platform.array_destroy(second).unwrap();
    }
}
