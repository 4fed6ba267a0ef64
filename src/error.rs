quick_error! {
    /// Reader and I/O failures.
    ///
    /// Standards violations found in a stream are *not* errors: they are
    /// reported through the diagnostic pipeline and the verification still
    /// completes. `Error` is returned only when the reader could not give
    /// the engine a stream to validate.
    #[derive(Debug)]
    pub enum Error {
        Io(err: std::io::Error) {
            from()
            display("i/o error: {}", err)
            source(err)
        }
        NotFits(why: &'static str) {
            display("not a FITS stream: {}", why)
        }
        EndNotFound(hdu: usize) {
            display("END keyword not found while reading the header of HDU {}", hdu)
        }
        TruncatedHdu(hdu: usize) {
            display("stream ends inside HDU {}", hdu)
        }
        BadHduIndex(index: usize, count: usize) {
            display("HDU {} does not exist (stream has {} HDU(s))", index, count)
        }
        PastEnd {
            display("position lies past the end of the stream")
        }
        KeywordNotFound(name: String) {
            display("keyword {} not present in the current header", name)
        }
        KeywordWrongType(name: String) {
            display("keyword {} does not hold a value of the requested type", name)
        }
        BadTform(form: String) {
            display("unparsable TFORM value '{}'", form)
        }
    }
}
