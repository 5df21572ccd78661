//! C linked lists
//!
//! Builds the `t_list` chains the bonus list functions work on:
//!
//! ```c
//! typedef struct s_list {
//!     void          *data;
//!     struct s_list *next;
//! } t_list;
//! ```
//!
//! Nodes and their data live in C-allocated memory because the native side
//! allocates (`list_push_front`) and frees (`list_remove_if`) them too.

use std::fmt;
use std::io;
use std::ptr;

use libc::{c_int, c_void};

use crate::ffi::{FfiError, FfiValue};

/// One `t_list` node
#[repr(C)]
#[derive(Debug)]
pub struct ListNode {
    pub data: *mut c_void,
    pub next: *mut ListNode,
}

/// A `t_list` chain of `int` data, freed on drop
pub struct IntList {
    /// Boxed so its address stays valid for `t_list **` arguments
    head: Box<*mut ListNode>,
}

fn c_alloc<T>(value: T) -> Result<*mut T, FfiError> {
    // Safety: malloc either fails or returns memory sized and aligned for T.
    let p = unsafe { libc::malloc(std::mem::size_of::<T>()) } as *mut T;
    if p.is_null() {
        return Err(FfiError::Os(io::Error::new(
            io::ErrorKind::OutOfMemory,
            "malloc failed",
        )));
    }
    unsafe { p.write(value) };
    Ok(p)
}

/// Allocate an `int` the way list data is allocated.
///
/// Ownership passes to the list the pointer is pushed into.
pub fn alloc_int(value: i32) -> Result<FfiValue, FfiError> {
    c_alloc(value as c_int).map(|p| FfiValue::ptr(p))
}

/// `int (*cmp)(void *, void *)` over `int` data, for `list_sort` and
/// `list_remove_if`
pub extern "C" fn compare_ints(a: *const c_void, b: *const c_void) -> c_int {
    // Safety: only passed as a comparator over lists built by IntList.
    let (a, b) = unsafe { (*(a as *const c_int), *(b as *const c_int)) };
    (a > b) as c_int - (a < b) as c_int
}

/// `void (*free_fct)(void *)` releasing list data
pub extern "C" fn free_data(data: *mut c_void) {
    unsafe { libc::free(data) };
}

/// [`compare_ints`] as a function-pointer argument
pub fn compare_ints_arg() -> FfiValue {
    FfiValue::Pointer(compare_ints as usize)
}

/// [`free_data`] as a function-pointer argument
pub fn free_data_arg() -> FfiValue {
    FfiValue::Pointer(free_data as usize)
}

impl IntList {
    pub fn new() -> Self {
        Self {
            head: Box::new(ptr::null_mut()),
        }
    }

    /// Build a list holding `values` in order
    pub fn from_values(values: &[i32]) -> Result<Self, FfiError> {
        let mut list = Self::new();
        for &value in values.iter().rev() {
            list.push_front(value)?;
        }
        Ok(list)
    }

    /// Rust-side push, for building fixtures
    pub fn push_front(&mut self, value: i32) -> Result<(), FfiError> {
        let data = c_alloc(value as c_int)?;
        let node = c_alloc(ListNode {
            data: data as *mut c_void,
            next: *self.head,
        });
        match node {
            Ok(node) => {
                *self.head = node;
                Ok(())
            }
            Err(e) => {
                unsafe { libc::free(data as *mut c_void) };
                Err(e)
            }
        }
    }

    /// `t_list *` argument
    pub fn head(&self) -> FfiValue {
        FfiValue::ptr(*self.head)
    }

    /// `t_list **` argument
    pub fn head_ref(&mut self) -> FfiValue {
        FfiValue::ptr(&mut *self.head as *mut *mut ListNode)
    }

    fn nodes(&self) -> impl Iterator<Item = &ListNode> {
        let mut cur = *self.head;
        std::iter::from_fn(move || {
            // Safety: every node reachable from head is a live t_list.
            let node = unsafe { cur.as_ref()? };
            cur = node.next;
            Some(node)
        })
    }

    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Data of every node, in list order
    pub fn to_vec(&self) -> Vec<i32> {
        self.nodes()
            .filter(|n| !n.data.is_null())
            .map(|n| unsafe { *(n.data as *const c_int) })
            .collect()
    }
}

impl Default for IntList {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IntList {
    fn drop(&mut self) {
        let mut cur = *self.head;
        while !cur.is_null() {
            // Safety: nodes and data were allocated with malloc, here or by
            // the native list functions.
            unsafe {
                let next = (*cur).next;
                libc::free((*cur).data);
                libc::free(cur as *mut c_void);
                cur = next;
            }
        }
        *self.head = ptr::null_mut();
    }
}

impl fmt::Display for IntList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "Node #{}:", i)?;
            writeln!(f, "Data location: {:p}.", node.data)?;
            if node.data.is_null() {
                writeln!(f, "Data: NULL.")?;
            } else {
                writeln!(f, "Data: {}.", unsafe { *(node.data as *const c_int) })?;
            }
            if node.next.is_null() {
                writeln!(f, "Next node address: NULL.")?;
            } else {
                writeln!(f, "Next node address: {:p}.", node.next)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for IntList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}
