//! Contains a set of compile failure doctests.

// -----------------------------------------------------------------------------
// Ensures non-send data cannot be moved into a pool job.

/** ```compile_fail,E0277

use std::rc::Rc;
use baton::ThreadPool;

let pool = ThreadPool::new(1).unwrap();
let r = Rc::new(22);
pool.spawn(move || *r); //~ ERROR

``` */
mod nonsend_input {}

// -----------------------------------------------------------------------------
// Ensures non-send data cannot be returned by a pool job.

/** ```compile_fail,E0277

use std::rc::Rc;
use baton::ThreadPool;

let pool = ThreadPool::new(1).unwrap();
pool.spawn(|| Rc::new(22)); //~ ERROR

``` */
mod nonsend_output {}

// -----------------------------------------------------------------------------
// Ensures pool jobs cannot borrow from the stack.

/** ```compile_fail,E0373

use baton::ThreadPool;

let pool = ThreadPool::new(1).unwrap();
let block = vec![1, 2, 3];
let task = pool.spawn(|| block.len()); //~ ERROR
drop(task);

``` */
mod borrowed_input {}

// -----------------------------------------------------------------------------
// Ensures a buffer of non-send items cannot be created.

/** ```compile_fail,E0277

use std::rc::Rc;
use baton::BoundedBuffer;

let buffer: BoundedBuffer<Rc<i32>> = BoundedBuffer::new(1); //~ ERROR

``` */
mod nonsend_buffer {}
