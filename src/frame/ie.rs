//! Tagged information elements.
//!
//! Management frame bodies end in a run of `(tag, length, value)`
//! triples. [`InfoElementIter`] walks them with bounds-checked slicing;
//! a truncated element terminates iteration, unknown tags are simply
//! yielded and skipped by the caller.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::TimInfo;

/// Element ids used by this design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Tag {
	Ssid = 0,
	SupportedRates = 1,
	DsParams = 3,
	Tim = 5,
	Country = 7,
	HtCapabilities = 45,
	ExtSupportedRates = 50,
	HtInformation = 61,
	Vendor = 221,
}

/// One parsed information element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoElement<'a> {
	pub tag: u8,
	pub data: &'a [u8],
}

/// Iterator over the information elements of a frame body.
#[derive(Debug, Clone)]
pub struct InfoElementIter<'a> {
	rest: &'a [u8],
}

impl<'a> InfoElementIter<'a> {
	/// `body` starts at the first element (after the fixed fields) and
	/// must already exclude the FCS.
	pub fn new(body: &'a [u8]) -> Self {
		Self { rest: body }
	}
}

impl<'a> Iterator for InfoElementIter<'a> {
	type Item = InfoElement<'a>;

	fn next(&mut self) -> Option<InfoElement<'a>> {
		if self.rest.len() < 2 {
			return None;
		}
		let tag = self.rest[0];
		let len = self.rest[1] as usize;
		if self.rest.len() < 2 + len {
			// Truncated element: stop rather than slice past the end.
			self.rest = &[];
			return None;
		}
		let data = &self.rest[2..2 + len];
		self.rest = &self.rest[2 + len..];
		Some(InfoElement { tag, data })
	}
}

/// First element with the given tag, if any.
pub fn find(body: &[u8], tag: Tag) -> Option<&[u8]> {
	InfoElementIter::new(body)
		.find(|ie| ie.tag == u8::from(tag))
		.map(|ie| ie.data)
}

pub(super) fn write_ssid(buf: &mut [u8], ssid: &str) -> usize {
	let bytes = ssid.as_bytes();
	buf[0] = Tag::Ssid.into();
	buf[1] = bytes.len() as u8;
	buf[2..2 + bytes.len()].copy_from_slice(bytes);
	2 + bytes.len()
}

pub(super) fn write_rates(buf: &mut [u8], tag: Tag, rates: &[u8]) -> usize {
	buf[0] = tag.into();
	buf[1] = rates.len() as u8;
	buf[2..2 + rates.len()].copy_from_slice(rates);
	2 + rates.len()
}

pub(super) fn write_ds_params(buf: &mut [u8], channel: u8) -> usize {
	buf[0] = Tag::DsParams.into();
	buf[1] = 1;
	buf[2] = channel;
	3
}

pub(super) fn write_tim(buf: &mut [u8], tim: &TimInfo) -> usize {
	buf[0] = Tag::Tim.into();
	buf[1] = 4;
	buf[2] = tim.dtim_count;
	buf[3] = tim.dtim_period;
	buf[4] = tim.bitmap_control;
	buf[5] = tim.bitmap;
	6
}

pub(super) fn write_ht_capabilities(buf: &mut [u8]) -> usize {
	const LEN: usize = 26;
	buf[0] = Tag::HtCapabilities.into();
	buf[1] = LEN as u8;
	let body = &mut buf[2..2 + LEN];
	body.fill(0);
	// HT capabilities info: 20 MHz only, greenfield not supported.
	body[0..2].copy_from_slice(&0x000cu16.to_le_bytes());
	// A-MPDU parameters.
	body[2] = 0x1b;
	// Rx MCS bitmask: single spatial stream, MCS 0-7.
	body[3] = 0xff;
	2 + LEN
}

pub(super) fn write_ht_information(buf: &mut [u8], channel: u8) -> usize {
	const LEN: usize = 22;
	buf[0] = Tag::HtInformation.into();
	buf[1] = LEN as u8;
	let body = &mut buf[2..2 + LEN];
	body.fill(0);
	body[0] = channel;
	2 + LEN
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn walks_all_elements() {
		let body = [0u8, 3, b'a', b'b', b'c', 3, 1, 6, 200, 2, 9, 9];
		let ies: std::vec::Vec<_> = InfoElementIter::new(&body).collect();
		assert_eq!(ies.len(), 3);
		assert_eq!(ies[0].tag, 0);
		assert_eq!(ies[0].data, b"abc");
		assert_eq!(ies[1].tag, 3);
		assert_eq!(ies[1].data, [6]);
		// Unknown tags are yielded too; callers skip them.
		assert_eq!(ies[2].tag, 200);
	}

	#[test]
	fn truncated_element_terminates() {
		let body = [0u8, 3, b'a', b'b', b'c', 3, 200, 6];
		let ies: std::vec::Vec<_> = InfoElementIter::new(&body).collect();
		assert_eq!(ies.len(), 1);
	}

	#[test]
	fn find_by_tag() {
		let body = [1u8, 2, 0x82, 0x84, 0, 1, b'x'];
		assert_eq!(find(&body, Tag::Ssid), Some(&b"x"[..]));
		assert_eq!(find(&body, Tag::SupportedRates), Some(&[0x82u8, 0x84][..]));
		assert_eq!(find(&body, Tag::Tim), None);
	}

	#[test]
	fn empty_ssid_is_wildcard() {
		let mut buf = [0u8; 8];
		assert_eq!(write_ssid(&mut buf, ""), 2);
		assert_eq!(&buf[..2], [0, 0]);
	}
}
