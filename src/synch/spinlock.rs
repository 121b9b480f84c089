use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};

/// A busy-waiting ticket lock.
///
/// Behaves like a normal mutex but can be used without an OS runtime and
/// is completely fair: waiters are served in ticket order.
pub struct Spinlock<T: ?Sized> {
	queue: AtomicUsize,
	dequeue: AtomicUsize,
	data: UnsafeCell<T>,
}

/// A guard through which the protected data can be accessed.
///
/// When the guard falls out of scope it releases the lock.
pub struct SpinlockGuard<'a, T: ?Sized> {
	dequeue: &'a AtomicUsize,
	ticket: usize,
	data: &'a mut T,
}

unsafe impl<T: ?Sized + Send> Sync for Spinlock<T> {}
unsafe impl<T: ?Sized + Send> Send for Spinlock<T> {}

impl<T> Spinlock<T> {
	pub const fn new(user_data: T) -> Spinlock<T> {
		Spinlock {
			queue: AtomicUsize::new(0),
			dequeue: AtomicUsize::new(1),
			data: UnsafeCell::new(user_data),
		}
	}

	/// Consumes this lock, returning the underlying data.
	#[allow(dead_code)]
	pub fn into_inner(self) -> T {
		let Spinlock { data, .. } = self;
		data.into_inner()
	}
}

impl<T: ?Sized> Spinlock<T> {
	pub fn lock(&self) -> SpinlockGuard<'_, T> {
		let ticket = self.queue.fetch_add(1, Ordering::Relaxed) + 1;

		while self.dequeue.load(Ordering::Acquire) != ticket {
			core::hint::spin_loop();
		}

		SpinlockGuard {
			dequeue: &self.dequeue,
			ticket,
			data: unsafe { &mut *self.data.get() },
		}
	}
}

impl<T: ?Sized> Deref for SpinlockGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &T {
		self.data
	}
}

impl<T: ?Sized> DerefMut for SpinlockGuard<'_, T> {
	fn deref_mut(&mut self) -> &mut T {
		self.data
	}
}

impl<T: ?Sized> Drop for SpinlockGuard<'_, T> {
	fn drop(&mut self) {
		self.dequeue.store(self.ticket + 1, Ordering::Release);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lock_unlock() {
		let lock = Spinlock::new(0u32);
		{
			let mut data = lock.lock();
			*data = 2;
		}
		assert_eq!(*lock.lock(), 2);
	}
}
