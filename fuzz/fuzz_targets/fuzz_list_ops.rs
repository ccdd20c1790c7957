#![no_main]

use std::ptr::NonNull;

use libfuzzer_sys::fuzz_target;

use segpool_core::{Link, PoolList};

const NODES: usize = 32;

fuzz_target!(|data: &[u8]| {
    let mut links = vec![Link::detached(); NODES];
    let mut linked = [false; NODES];
    let mut list = PoolList::<Link>::new();
    let base = links.as_mut_ptr();
    let node = |i: usize| NonNull::new(base.wrapping_add(i)).unwrap();
    let index = |p: NonNull<Link>| (p.as_ptr() as usize - base as usize) / std::mem::size_of::<Link>();

    // Each byte is one operation: high 3 bits pick it, low 5 bits pick the node.
    for &byte in data {
        let n = usize::from(byte & 0x1f);
        match byte >> 5 {
            0 | 1 if !linked[n] => {
                unsafe { list.push(node(n)) };
                linked[n] = true;
            }
            2 if !linked[n] => {
                unsafe { list.push_front(node(n)) };
                linked[n] = true;
            }
            3 => {
                if let Some(p) = list.pop() {
                    linked[index(p)] = false;
                }
            }
            4 => {
                if let Some(p) = list.pop_front() {
                    linked[index(p)] = false;
                }
            }
            5 if linked[n] => {
                unsafe { list.remove(node(n)) };
                linked[n] = false;
            }
            6 if !linked[n] => {
                let anchor = list.head();
                unsafe { list.insert_after(anchor, node(n)) };
                linked[n] = true;
            }
            _ => {}
        }

        assert!(list.is_consistent());
        assert_eq!(list.len(), linked.iter().filter(|&&l| l).count());
        assert!(list.iter().all(|p| linked[index(p)]));
    }
});
