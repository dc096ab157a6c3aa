//! Decoding encoded values.
//!
//! This is an internal module. Its public types are re-exported by the
//! parent.

use bytes::Bytes;
use super::error::Error;
use super::length::Length;
use super::source::{CaptureSource, LimitedSource, Source};
use super::tag::Tag;


/// The maximum nesting depth of constructed values.
///
/// A certificate doesn’t get anywhere near this. Anything deeper is
/// considered malformed.
pub const MAX_DEPTH: usize = 64;


//------------ Content -------------------------------------------------------

/// The content octets of an encoded value.
///
/// A value is either primitive, containing actual octets of an actual value,
/// or constructed, in which case its content contains additional encoded
/// values.
pub enum Content<'a, S: 'a> {
    /// The value is a primitive value.
    Primitive(Primitive<'a, S>),

    /// The value is a constructed value.
    Constructed(Constructed<'a, S>)
}

impl<'a, S: Source + 'a> Content<'a, S> {
    /// Checkes that the content has been parsed completely.
    fn exhausted(self) -> Result<(), S::Err> {
        match self {
            Content::Primitive(inner) => inner.exhausted(),
            Content::Constructed(mut inner) => inner.exhausted()
        }
    }

    /// Converts a reference into one to a primitive value or errors out.
    pub fn as_primitive(&mut self) -> Result<&mut Primitive<'a, S>, S::Err> {
        match *self {
            Content::Primitive(ref mut inner) => Ok(inner),
            Content::Constructed(_) => {
                xerr!(Err(Error::Malformed.into()))
            }
        }
    }

    /// Converts a reference into one to a constructed value or errors out.
    pub fn as_constructed(
        &mut self
    ) -> Result<&mut Constructed<'a, S>, S::Err> {
        match *self {
            Content::Primitive(_) => {
                xerr!(Err(Error::Malformed.into()))
            }
            Content::Constructed(ref mut inner) => Ok(inner),
        }
    }

    /// Skips over the content, whatever it is.
    pub fn skip_all(&mut self) -> Result<(), S::Err> {
        match *self {
            Content::Primitive(ref mut inner) => inner.skip_all(),
            Content::Constructed(ref mut inner) => inner.skip_all(),
        }
    }

    /// Returns the content octets as a bytes value.
    pub fn take_all(&mut self) -> Result<Bytes, S::Err> {
        match *self {
            Content::Primitive(ref mut inner) => inner.take_all(),
            Content::Constructed(ref mut inner) => inner.take_all(),
        }
    }
}


//------------ Primitive -----------------------------------------------------

/// The content octets of a primitive value.
///
/// You will receive a reference to a value of this type through a closure,
/// possibly wrapped in a `Content` value. Your task will be to read out all
/// the octets of the value before returning from the closure or produce an
/// error if the value isn’t correctly encoded. Attempting to read more
/// octets than available reliably results in a malformed error.
///
/// Low-level access happens through the primitive’s implementation of the
/// `Source` trait. The methods prefixed with `to_` convert the content into
/// a certain type and honour the decoding mode.
pub struct Primitive<'a, S: 'a> {
    /// The underlying source limited to the length of the value.
    source: &'a mut LimitedSource<S>,

    /// The decoding mode to operate in.
    mode: Mode,
}

impl<'a, S: 'a> Primitive<'a, S> {
    fn new(source: &'a mut LimitedSource<S>, mode: Mode) -> Self {
        Primitive { source, mode }
    }

    /// Returns the current decoding mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl<'a, S: Source + 'a> Primitive<'a, S> {
    /// Parses the primitive value as a BOOLEAN value.
    ///
    /// In DER mode, the octet has to be `0` for a value of `false` and
    /// `0xFF` for a value of `true`. Otherwise, anything but zero is
    /// `true`.
    pub fn to_bool(&mut self) -> Result<bool, S::Err> {
        let res = self.take_u8()?;
        if self.mode == Mode::Der {
            match res {
                0 => Ok(false),
                0xFF => Ok(true),
                _ => xerr!(Err(Error::Malformed.into()))
            }
        }
        else {
            Ok(res != 0)
        }
    }

    /// Parses the primitive value as an INTEGER limited to a `u8`.
    pub fn to_u8(&mut self) -> Result<u8, S::Err> {
        let res = self.to_u64()?;
        if res > u8::MAX as u64 {
            xerr!(Err(Error::Malformed.into()))
        }
        else {
            Ok(res as u8)
        }
    }

    /// Parses the primitive value as an INTEGER limited to a `u64`.
    pub fn to_u64(&mut self) -> Result<u64, S::Err> {
        self.check_unsigned_head()?;
        if self.remaining() == 9 {
            // The only permitted nine octet value has a leading zero.
            if self.take_u8()? != 0 {
                xerr!(return Err(Error::Malformed.into()))
            }
        }
        if self.remaining() > 8 {
            xerr!(return Err(Error::Malformed.into()))
        }
        let mut res = 0;
        while self.remaining() > 0 {
            res = res << 8 | (self.take_u8()? as u64);
        }
        Ok(res)
    }

    /// Checks that the content starts a non-negative INTEGER.
    ///
    /// There has to be at least one octet and the first nine bits of a
    /// multi-octet integer must not all be zero.
    fn check_unsigned_head(&mut self) -> Result<(), S::Err> {
        let avail = self.request(2)?;
        let slice = self.slice();
        if avail == 0 || slice[0] & 0x80 != 0 {
            xerr!(return Err(Error::Malformed.into()))
        }
        if avail > 1 && slice[0] == 0 && slice[1] & 0x80 == 0 {
            xerr!(return Err(Error::Malformed.into()))
        }
        Ok(())
    }
}

impl<'a, S: Source + 'a> Primitive<'a, S> {
    /// Returns the number of remaining octets.
    pub fn remaining(&self) -> usize {
        self.source.limit().unwrap_or(0)
    }

    /// Skips the rest of the content.
    pub fn skip_all(&mut self) -> Result<(), S::Err> {
        self.source.skip_all()
    }

    /// Returns the remainder of the content as a `Bytes` value.
    pub fn take_all(&mut self) -> Result<Bytes, S::Err> {
        self.source.take_all()
    }

    /// Returns a bytes slice of the remainder of the content.
    ///
    /// This doesn’t advance over the content.
    pub fn slice_all(&mut self) -> Result<&[u8], S::Err> {
        let remaining = self.remaining();
        if self.source.request(remaining)? < remaining {
            xerr!(return Err(Error::Malformed.into()))
        }
        Ok(&self.source.slice()[..remaining])
    }

    /// Checkes whether all content has been advanced over.
    fn exhausted(self) -> Result<(), S::Err> {
        self.source.exhausted()
    }
}

impl<'a, S: Source + 'a> Source for Primitive<'a, S> {
    type Err = S::Err;

    fn request(&mut self, len: usize) -> Result<usize, Self::Err> {
        self.source.request(len)
    }

    fn advance(&mut self, len: usize) -> Result<(), Self::Err> {
        self.source.advance(len)
    }

    fn slice(&self) -> &[u8] {
        self.source.slice()
    }

    fn bytes(&self, start: usize, end: usize) -> Bytes {
        self.source.bytes(start, end)
    }
}


//------------ Constructed ---------------------------------------------------

/// The content octets of a constructed value.
///
/// You will only ever receive a mutable reference to a value of this type
/// as an argument to a closure provided to some function. Your closure will
/// have to advance over the complete content using the value’s methods.
///
/// Since constructed values consist of a sequence of values, these methods
/// allow you to process these values one by one. The `take_` methods
/// require a value to be present while the `take_opt_` methods return
/// `Ok(None)` if the end has been reached or the next value has a different
/// tag.
#[derive(Debug)]
pub struct Constructed<'a, S: 'a> {
    /// The underlying source.
    source: &'a mut LimitedSource<S>,

    /// The state we are in so we can determine the end of the content.
    state: State,

    /// The encoding mode to use.
    mode: Mode,

    /// The nesting depth of this value.
    depth: usize,
}

impl<'a, S: Source + 'a> Constructed<'a, S> {
    fn new(
        source: &'a mut LimitedSource<S>,
        state: State,
        mode: Mode,
        depth: usize,
    ) -> Self {
        Constructed { source, state, mode, depth }
    }

    /// Returns the encoding mode used by the value.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns the nesting depth of the value.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Checks whether all content has advanced over.
    ///
    /// For a value of definite length, this is the case when the limit of
    /// the source has been reached. For indefinite values, we need to have
    /// either read or can now read the end-of-value marker.
    fn exhausted(&mut self) -> Result<(), S::Err> {
        match self.state {
            State::Done => Ok(()),
            State::Definite | State::Unbounded => self.source.exhausted(),
            State::Indefinite => {
                let (tag, constructed) = Tag::take_from(self.source)?;
                if tag != Tag::END_OF_VALUE || constructed {
                    xerr!(return Err(Error::Malformed.into()))
                }
                if !Length::take_from(self.source, self.mode)?.is_zero() {
                    xerr!(return Err(Error::Malformed.into()))
                }
                self.state = State::Done;
                Ok(())
            }
        }
    }

    /// Returns whether we have already reached the end.
    ///
    /// For indefinite values, we may be at the end right now but don’t
    /// know it yet.
    fn is_exhausted(&mut self) -> Result<bool, S::Err> {
        match self.state {
            State::Definite => Ok(self.source.limit() == Some(0)),
            State::Indefinite => Ok(false),
            State::Done => Ok(true),
            State::Unbounded => Ok(self.source.request(1)? == 0),
        }
    }

    /// Processes the next value.
    ///
    /// If `expected` is not `None`, the method will only process a value
    /// with the given tag and return `Ok(None)` if there isn’t another value
    /// or if the next value has a different tag.
    ///
    /// If `expected` is `None`, the method will process a value with any
    /// tag and only return `Ok(None)` if it reached the end of the value.
    fn process_next_value<F, T>(
        &mut self,
        expected: Option<Tag>,
        op: F
    ) -> Result<Option<T>, S::Err>
    where F: FnOnce(Tag, &mut Content<S>) -> Result<T, S::Err> {
        if self.is_exhausted()? {
            return Ok(None)
        }
        let (tag, constructed) = match expected {
            Some(expected) => {
                match expected.take_from_if(self.source)? {
                    Some(constructed) => (expected, constructed),
                    None => {
                        // We may be looking at the end-of-value marker of
                        // an indefinite value.
                        if let State::Indefinite = self.state {
                            self.check_end_of_value()?;
                        }
                        return Ok(None)
                    }
                }
            }
            None => Tag::take_from(self.source)?
        };
        let length = Length::take_from(self.source, self.mode)?;

        if tag == Tag::END_OF_VALUE {
            if let State::Indefinite = self.state {
                if constructed || !length.is_zero() {
                    xerr!(return Err(Error::Malformed.into()))
                }
                self.state = State::Done;
                return Ok(None)
            }
            else {
                xerr!(return Err(Error::Malformed.into()))
            }
        }

        let depth = self.depth + 1;
        if constructed && depth > MAX_DEPTH {
            xerr!(return Err(Error::Malformed.into()))
        }

        match length {
            Length::Definite(len) => {
                let old_limit = self.source.limit_further(len)?;
                let res = {
                    let mut content = if constructed {
                        Content::Constructed(Constructed::new(
                            self.source, State::Definite, self.mode, depth
                        ))
                    }
                    else {
                        Content::Primitive(
                            Primitive::new(self.source, self.mode)
                        )
                    };
                    let res = op(tag, &mut content)?;
                    content.exhausted()?;
                    res
                };
                self.source.set_limit(old_limit.map(|x| x - len));
                Ok(Some(res))
            }
            Length::Indefinite => {
                if !constructed {
                    xerr!(return Err(Error::Malformed.into()))
                }
                let mut content = Content::Constructed(Constructed::new(
                    self.source, State::Indefinite, self.mode, depth
                ));
                let res = op(tag, &mut content)?;
                content.exhausted()?;
                Ok(Some(res))
            }
        }
    }

    /// Consumes the end-of-value marker if it is next.
    fn check_end_of_value(&mut self) -> Result<(), S::Err> {
        if self.source.request(2)? < 2 {
            return Ok(())
        }
        if self.source.slice()[..2] == [0, 0] {
            self.source.advance(2)?;
            self.state = State::Done;
        }
        Ok(())
    }
}

impl<'a, S: Source + 'a> Constructed<'a, S> {
    /// Process one value of content.
    ///
    /// The closure `op` receives the tag and content of the next value
    /// and must process it completely, advancing to the content’s end.
    /// The method returns a malformed error if there isn’t at least one more
    /// value available.
    pub fn take_value<F, T>(&mut self, op: F) -> Result<T, S::Err>
    where F: FnOnce(Tag, &mut Content<S>) -> Result<T, S::Err> {
        match self.process_next_value(None, op)? {
            Some(res) => Ok(res),
            None => xerr!(Err(Error::Malformed.into()))
        }
    }

    /// Processes an optional value.
    ///
    /// If there are no more values available, the method returns `Ok(None)`.
    pub fn take_opt_value<F, T>(&mut self, op: F) -> Result<Option<T>, S::Err>
    where F: FnOnce(Tag, &mut Content<S>) -> Result<T, S::Err> {
        self.process_next_value(None, op)
    }

    /// Processes an optional value with the given tag.
    ///
    /// If the next value has a different tag or if the end of the value has
    /// been reached, the method returns `Ok(None)`.
    pub fn take_opt_value_if<F, T>(
        &mut self,
        expected: Tag,
        op: F
    ) -> Result<Option<T>, S::Err>
    where F: FnOnce(&mut Content<S>) -> Result<T, S::Err> {
        self.process_next_value(Some(expected), |_, content| op(content))
    }

    /// Processes a constructed value with a required tag.
    pub fn take_constructed_if<F, T>(
        &mut self,
        expected: Tag,
        op: F
    ) -> Result<T, S::Err>
    where F: FnOnce(&mut Constructed<S>) -> Result<T, S::Err> {
        match self.take_opt_constructed_if(expected, op)? {
            Some(res) => Ok(res),
            None => xerr!(Err(Error::Malformed.into()))
        }
    }

    /// Processes an optional constructed value if it has a given tag.
    ///
    /// If the next value has the tag but is primitive, a malformed error
    /// is returned.
    pub fn take_opt_constructed_if<F, T>(
        &mut self,
        expected: Tag,
        op: F
    ) -> Result<Option<T>, S::Err>
    where F: FnOnce(&mut Constructed<S>) -> Result<T, S::Err> {
        self.process_next_value(Some(expected), |_, content| {
            op(content.as_constructed()?)
        })
    }

    /// Processes a primitive value with any tag.
    pub fn take_primitive<F, T>(&mut self, op: F) -> Result<T, S::Err>
    where F: FnOnce(Tag, &mut Primitive<S>) -> Result<T, S::Err> {
        let res = self.process_next_value(None, |tag, content| {
            op(tag, content.as_primitive()?)
        })?;
        match res {
            Some(res) => Ok(res),
            None => xerr!(Err(Error::Malformed.into()))
        }
    }

    /// Processes a primitive value with a required tag.
    pub fn take_primitive_if<F, T>(
        &mut self,
        expected: Tag,
        op: F
    ) -> Result<T, S::Err>
    where F: FnOnce(&mut Primitive<S>) -> Result<T, S::Err> {
        match self.take_opt_primitive_if(expected, op)? {
            Some(res) => Ok(res),
            None => xerr!(Err(Error::Malformed.into()))
        }
    }

    /// Processes an optional primitive value with a given tag.
    pub fn take_opt_primitive_if<F, T>(
        &mut self,
        expected: Tag,
        op: F
    ) -> Result<Option<T>, S::Err>
    where F: FnOnce(&mut Primitive<S>) -> Result<T, S::Err> {
        self.process_next_value(Some(expected), |_, content| {
            op(content.as_primitive()?)
        })
    }

    /// Captures the octets advanced over by the closure.
    ///
    /// The closure receives a constructed value covering the remainder of
    /// this value. Everything it processes is returned in encoded form.
    pub fn capture<F>(&mut self, op: F) -> Result<Bytes, S::Err>
    where
        F: FnOnce(
            &mut Constructed<CaptureSource<LimitedSource<S>>>
        ) -> Result<(), S::Err>
    {
        let limit = self.source.limit();
        let mut source = LimitedSource::new(CaptureSource::new(self.source));
        source.set_limit(limit);
        {
            let mut cons = Constructed::new(
                &mut source, self.state, self.mode, self.depth
            );
            op(&mut cons)?;
            self.state = cons.state;
        }
        source.into_inner().into_bytes()
    }

    /// Returns the remaining content in encoded form.
    ///
    /// For a value of definite length, this is done without looking at
    /// the contained values at all.
    pub fn take_all(&mut self) -> Result<Bytes, S::Err> {
        match self.state {
            State::Definite => self.source.take_all(),
            _ => self.capture(|cons| cons.skip_all())
        }
    }

    /// Skips over all remaining values.
    pub fn skip_all(&mut self) -> Result<(), S::Err> {
        match self.state {
            State::Definite => self.source.skip_all(),
            _ => {
                while let Some(()) = self.skip_one()? { }
                Ok(())
            }
        }
    }

    /// Skips over the next value if there is one.
    ///
    /// Values of definite length are skipped in one go. Only values of
    /// indefinite length need to be walked to find their end.
    pub fn skip_one(&mut self) -> Result<Option<()>, S::Err> {
        self.take_opt_value(|_, content| content.skip_all())
    }
}

impl<'a, S: Source + 'a> Constructed<'a, S> {
    pub fn take_opt_bool(&mut self) -> Result<Option<bool>, S::Err> {
        self.take_opt_primitive_if(Tag::BOOLEAN, |prim| prim.to_bool())
    }

    pub fn sequence<F, T>(&mut self, op: F) -> Result<T, S::Err>
    where F: FnOnce(&mut Constructed<S>) -> Result<T, S::Err> {
        self.take_constructed_if(Tag::SEQUENCE, op)
    }

    pub fn opt_sequence<F, T>(&mut self, op: F) -> Result<Option<T>, S::Err>
    where F: FnOnce(&mut Constructed<S>) -> Result<T, S::Err> {
        self.take_opt_constructed_if(Tag::SEQUENCE, op)
    }

    pub fn opt_set<F, T>(&mut self, op: F) -> Result<Option<T>, S::Err>
    where F: FnOnce(&mut Constructed<S>) -> Result<T, S::Err> {
        self.take_opt_constructed_if(Tag::SET, op)
    }
}


//------------ Mode ----------------------------------------------------------

/// The encoding rules to decode with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Basic Encoding Rules.
    ///
    /// These are the most flexible rules, allowing alternative encodings for
    /// some types as well as indefinite length values.
    Ber,

    /// Distinguished Encoding Rules.
    ///
    /// These rules always employ definite length values and require the
    /// shortest possible encoding.
    Der,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Ber
    }
}

impl Mode {
    /// Decodes a source using these rules.
    ///
    /// The closure receives a constructed value spanning the complete
    /// source and must advance over all of it.
    pub fn decode<S, F, T>(self, source: S, op: F) -> Result<T, S::Err>
    where
        S: Source,
        F: FnOnce(&mut Constructed<S>) -> Result<T, S::Err>
    {
        let mut source = LimitedSource::new(source);
        let mut cons = Constructed::new(&mut source, State::Unbounded, self, 0);
        let res = op(&mut cons)?;
        cons.exhausted()?;
        Ok(res)
    }
}


//------------ State ---------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum State {
    /// We are reading until the end of the limit.
    Definite,

    /// Indefinite value, we haven’t reached the end yet.
    Indefinite,

    /// End of indefinite value reached.
    Done,

    /// Unbounded value: read as far as we get.
    Unbounded,
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn der(data: &'static [u8]) -> Bytes {
        Bytes::from_static(data)
    }

    fn opt_u64<S: Source>(
        cons: &mut Constructed<S>
    ) -> Result<Option<u64>, S::Err> {
        cons.take_opt_primitive_if(Tag::INTEGER, |prim| prim.to_u64())
    }

    #[test]
    fn sequence_of_integers() {
        let res = Mode::Der.decode(der(b"\x30\x06\x02\x01\x05\x02\x01\x7f"),
            |cons| cons.sequence(|cons| {
                Ok((opt_u64(cons)?, opt_u64(cons)?))
            })
        );
        assert_eq!(res, Ok((Some(5), Some(127))));
    }

    #[test]
    fn length_beyond_parent() {
        // The inner INTEGER claims four octets but the sequence only has
        // three left.
        let res = Mode::Der.decode(der(b"\x30\x03\x02\x04\x01\x02\x03\x04"),
            |cons| cons.sequence(|cons| opt_u64(cons))
        );
        assert_eq!(res, Err(Error::Malformed));
    }

    #[test]
    fn length_beyond_input() {
        let res = Mode::Der.decode(der(b"\x30\x81\x90\x02\x01\x01"),
            |cons| cons.sequence(|cons| cons.skip_all())
        );
        assert_eq!(res, Err(Error::Malformed));
    }

    #[test]
    fn unparsed_content_is_an_error() {
        let res = Mode::Der.decode(der(b"\x30\x06\x02\x01\x05\x02\x01\x7f"),
            |cons| cons.sequence(|cons| opt_u64(cons))
        );
        assert_eq!(res, Err(Error::Malformed));
    }

    #[test]
    fn optional_values() {
        let res = Mode::Der.decode(der(b"\x30\x05\xa0\x03\x02\x01\x02"),
            |cons| cons.sequence(|cons| {
                let missing = cons.take_opt_bool()?;
                let version = cons.take_opt_constructed_if(Tag::CTX_0,
                    |cons| cons.take_primitive_if(Tag::INTEGER,
                        |prim| prim.to_u8()
                    )
                )?;
                Ok((missing, version))
            })
        );
        assert_eq!(res, Ok((None, Some(2))));
    }

    #[test]
    fn take_all_does_not_descend() {
        // The inner content isn't valid but is never looked at.
        let res = Mode::Der.decode(der(b"\x30\x03\xff\xff\xff"),
            |cons| cons.sequence(|cons| cons.take_all())
        );
        assert_eq!(res, Ok(der(b"\xff\xff\xff")));
    }

    #[test]
    fn nesting_is_limited() {
        fn nested(depth: usize) -> Bytes {
            let mut res = vec![0x05, 0x00];
            for _ in 0..depth {
                let len = res.len();
                let mut outer = vec![0x30];
                if len < 0x80 {
                    outer.push(len as u8);
                }
                else {
                    outer.extend_from_slice(&[0x81, len as u8]);
                }
                outer.extend_from_slice(&res);
                res = outer;
            }
            Bytes::from(res)
        }

        fn walk<S: Source>(cons: &mut Constructed<S>) -> Result<(), S::Err> {
            cons.take_value(|_, content| {
                match *content {
                    Content::Primitive(ref mut prim) => prim.skip_all(),
                    Content::Constructed(ref mut inner) => walk(inner),
                }
            })
        }

        assert!(Mode::Der.decode(nested(MAX_DEPTH), walk).is_ok());
        assert_eq!(
            Mode::Der.decode(nested(MAX_DEPTH + 1), walk),
            Err(Error::Malformed)
        );
    }

    #[test]
    fn indefinite_length_in_ber() {
        let data = der(b"\x30\x80\x02\x01\x05\x00\x00");
        let res = Mode::Ber.decode(data.clone(),
            |cons| cons.sequence(|cons| opt_u64(cons))
        );
        assert_eq!(res, Ok(Some(5)));
        assert_eq!(
            Mode::Der.decode(data, |cons| cons.skip_all()),
            Err(Error::Malformed)
        );
    }

    #[test]
    fn integers() {
        let take = |data: &'static [u8]| {
            Mode::Der.decode(der(data), |cons| opt_u64(cons))
        };
        assert_eq!(take(b"\x02\x01\x00"), Ok(Some(0)));
        assert_eq!(take(b"\x02\x02\x00\x80"), Ok(Some(128)));
        assert_eq!(take(b"\x02\x02\x00\x05"), Err(Error::Malformed));
        assert_eq!(take(b"\x02\x01\x80"), Err(Error::Malformed));
        assert_eq!(take(b"\x02\x00"), Err(Error::Malformed));
    }
}
