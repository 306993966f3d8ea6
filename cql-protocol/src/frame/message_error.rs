/// This modules contains [server errors](<https://github.com/apache/cassandra/blob/trunk/doc/native_protocol_v4.spec>)
/// which a node could respond with.
use derive_more::Display;
use std::io::Cursor;

use crate::consistency::Consistency;
use crate::error;
use crate::frame::traits::FromCursor;
use crate::frame::{Frame, Opcode, Serialize, StreamId, Version};
use crate::types::*;
use crate::Error;

/// Error returned by a node as a response. It contains an error code and an error message.
/// Depending on the error code, it could contain additional information represented by
/// `additional_info`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ErrorBody {
    /// `CInt` that points to a type of error.
    pub error_code: CInt,
    /// Error message string.
    pub message: String,
    /// Additional information.
    pub additional_info: AdditionalErrorInfo,
}

impl ErrorBody {
    /// Checks if the node rejected the protocol version used by the connection.
    pub fn is_bad_protocol(&self) -> bool {
        self.additional_info == AdditionalErrorInfo::Protocol
            && self.message.to_lowercase().contains("version")
    }
}

impl Serialize for ErrorBody {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.error_code.serialize(cursor);
        serialize_str(cursor, &self.message);
        self.additional_info.serialize(cursor);
    }
}

impl FromCursor for ErrorBody {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<ErrorBody> {
        let error_code = CInt::from_cursor(cursor)?;
        let message = from_cursor_str(cursor)?.to_string();
        let additional_info = AdditionalErrorInfo::from_cursor_with_code(cursor, error_code)?;

        Ok(ErrorBody {
            error_code,
            message,
            additional_info,
        })
    }
}

impl Frame {
    pub fn new_res_error(version: Version, stream: StreamId, body: &ErrorBody) -> Frame {
        Frame::new_response(version, Opcode::Error, stream, body.serialize_to_vec())
    }
}

/// Additional error info in accordance to the protocol.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AdditionalErrorInfo {
    Server,
    Protocol,
    Authentication,
    Unavailable(UnavailableError),
    Overloaded,
    IsBootstrapping,
    Truncate,
    WriteTimeout(WriteTimeoutError),
    ReadTimeout(ReadTimeoutError),
    ReadFailure(ReadFailureError),
    FunctionFailure(FunctionFailureError),
    WriteFailure(WriteFailureError),
    Syntax,
    Unauthorized,
    Invalid,
    Config,
    AlreadyExists(AlreadyExistsError),
    Unprepared(UnpreparedError),
}

impl Serialize for AdditionalErrorInfo {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        match self {
            AdditionalErrorInfo::Unavailable(unavailable) => unavailable.serialize(cursor),
            AdditionalErrorInfo::WriteTimeout(write_timeout) => write_timeout.serialize(cursor),
            AdditionalErrorInfo::ReadTimeout(read_timeout) => read_timeout.serialize(cursor),
            AdditionalErrorInfo::ReadFailure(read_failure) => read_failure.serialize(cursor),
            AdditionalErrorInfo::FunctionFailure(function_failure) => {
                function_failure.serialize(cursor)
            }
            AdditionalErrorInfo::WriteFailure(write_failure) => write_failure.serialize(cursor),
            AdditionalErrorInfo::AlreadyExists(already_exists) => {
                already_exists.serialize(cursor)
            }
            AdditionalErrorInfo::Unprepared(unprepared) => unprepared.serialize(cursor),
            _ => {}
        }
    }
}

impl AdditionalErrorInfo {
    pub fn from_cursor_with_code(
        cursor: &mut Cursor<&[u8]>,
        error_code: CInt,
    ) -> error::Result<AdditionalErrorInfo> {
        match error_code {
            0x0000 => Ok(AdditionalErrorInfo::Server),
            0x000A => Ok(AdditionalErrorInfo::Protocol),
            0x0100 => Ok(AdditionalErrorInfo::Authentication),
            0x1000 => UnavailableError::from_cursor(cursor).map(AdditionalErrorInfo::Unavailable),
            0x1001 => Ok(AdditionalErrorInfo::Overloaded),
            0x1002 => Ok(AdditionalErrorInfo::IsBootstrapping),
            0x1003 => Ok(AdditionalErrorInfo::Truncate),
            0x1100 => WriteTimeoutError::from_cursor(cursor).map(AdditionalErrorInfo::WriteTimeout),
            0x1200 => ReadTimeoutError::from_cursor(cursor).map(AdditionalErrorInfo::ReadTimeout),
            0x1300 => ReadFailureError::from_cursor(cursor).map(AdditionalErrorInfo::ReadFailure),
            0x1400 => {
                FunctionFailureError::from_cursor(cursor).map(AdditionalErrorInfo::FunctionFailure)
            }
            0x1500 => WriteFailureError::from_cursor(cursor).map(AdditionalErrorInfo::WriteFailure),
            0x2000 => Ok(AdditionalErrorInfo::Syntax),
            0x2100 => Ok(AdditionalErrorInfo::Unauthorized),
            0x2200 => Ok(AdditionalErrorInfo::Invalid),
            0x2300 => Ok(AdditionalErrorInfo::Config),
            0x2400 => {
                AlreadyExistsError::from_cursor(cursor).map(AdditionalErrorInfo::AlreadyExists)
            }
            0x2500 => UnpreparedError::from_cursor(cursor).map(AdditionalErrorInfo::Unprepared),
            _ => Err(Error::UnexpectedErrorCode(error_code)),
        }
    }
}

/// Additional info about unavailable exception.
#[derive(Debug, PartialEq, Ord, PartialOrd, Eq, Copy, Clone, Hash)]
pub struct UnavailableError {
    /// Consistency level of query.
    pub cl: Consistency,
    /// Number of nodes that should be available to respect `cl`.
    pub required: CInt,
    /// Number of replicas that we were know to be alive.
    pub alive: CInt,
}

impl Serialize for UnavailableError {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.cl.serialize(cursor);
        self.required.serialize(cursor);
        self.alive.serialize(cursor);
    }
}

impl FromCursor for UnavailableError {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<UnavailableError> {
        let cl = Consistency::from_cursor(cursor)?;
        let required = CInt::from_cursor(cursor)?;
        let alive = CInt::from_cursor(cursor)?;

        Ok(UnavailableError {
            cl,
            required,
            alive,
        })
    }
}

/// Timeout exception during a write request.
#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash)]
pub struct WriteTimeoutError {
    /// Consistency level of query.
    pub cl: Consistency,
    /// Number of nodes having acknowledged the request.
    pub received: CInt,
    /// Number of replicas whose acknowledgement is required to achieve `cl`.
    pub block_for: CInt,
    /// Describes the type of the write that timed out
    pub write_type: WriteType,
}

impl Serialize for WriteTimeoutError {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.cl.serialize(cursor);
        self.received.serialize(cursor);
        self.block_for.serialize(cursor);
        self.write_type.serialize(cursor);
    }
}

impl FromCursor for WriteTimeoutError {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<WriteTimeoutError> {
        let cl = Consistency::from_cursor(cursor)?;
        let received = CInt::from_cursor(cursor)?;
        let block_for = CInt::from_cursor(cursor)?;
        let write_type = WriteType::from_cursor(cursor)?;

        Ok(WriteTimeoutError {
            cl,
            received,
            block_for,
            write_type,
        })
    }
}

/// Timeout exception during a read request.
#[derive(Debug, PartialEq, Ord, PartialOrd, Eq, Copy, Clone, Hash)]
pub struct ReadTimeoutError {
    /// Consistency level of query.
    pub cl: Consistency,
    /// Number of nodes having acknowledged the request.
    pub received: CInt,
    /// Number of replicas whose acknowledgement is required to achieve `cl`.
    pub block_for: CInt,
    pub data_present: u8,
}

impl ReadTimeoutError {
    /// Shows if a replica has responded to a query.
    #[inline]
    pub fn replica_has_responded(&self) -> bool {
        self.data_present != 0
    }
}

impl Serialize for ReadTimeoutError {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.cl.serialize(cursor);
        self.received.serialize(cursor);
        self.block_for.serialize(cursor);
        self.data_present.serialize(cursor);
    }
}

impl FromCursor for ReadTimeoutError {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<ReadTimeoutError> {
        let cl = Consistency::from_cursor(cursor)?;
        let received = CInt::from_cursor(cursor)?;
        let block_for = CInt::from_cursor(cursor)?;
        let data_present = u8::from_cursor(cursor)?;

        Ok(ReadTimeoutError {
            cl,
            received,
            block_for,
            data_present,
        })
    }
}

/// A non-timeout exception during a read request.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ReadFailureError {
    /// Consistency level of query.
    pub cl: Consistency,
    /// The number of nodes having acknowledged the request.
    pub received: CInt,
    /// The number of replicas whose acknowledgement is required to achieve `cl`.
    pub block_for: CInt,
    /// Number of nodes that experienced a failure while executing the request.
    pub num_failures: CInt,
    pub data_present: u8,
}

impl Serialize for ReadFailureError {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.cl.serialize(cursor);
        self.received.serialize(cursor);
        self.block_for.serialize(cursor);
        self.num_failures.serialize(cursor);
        self.data_present.serialize(cursor);
    }
}

impl FromCursor for ReadFailureError {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<ReadFailureError> {
        let cl = Consistency::from_cursor(cursor)?;
        let received = CInt::from_cursor(cursor)?;
        let block_for = CInt::from_cursor(cursor)?;
        let num_failures = CInt::from_cursor(cursor)?;
        let data_present = u8::from_cursor(cursor)?;

        Ok(ReadFailureError {
            cl,
            received,
            block_for,
            num_failures,
            data_present,
        })
    }
}

/// A (user defined) function failed during execution.
#[derive(Debug, PartialEq, Ord, PartialOrd, Eq, Hash, Clone)]
pub struct FunctionFailureError {
    /// The keyspace of the failed function.
    pub keyspace: String,
    /// The name of the failed function
    pub function: String,
    /// One string for each argument type (as CQL type) of the failed function.
    pub arg_types: Vec<String>,
}

impl Serialize for FunctionFailureError {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str(cursor, &self.keyspace);
        serialize_str(cursor, &self.function);
        serialize_str_list(cursor, self.arg_types.iter().map(|x| x.as_str()));
    }
}

impl FromCursor for FunctionFailureError {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<FunctionFailureError> {
        let keyspace = from_cursor_str(cursor)?.to_string();
        let function = from_cursor_str(cursor)?.to_string();
        let arg_types = from_cursor_string_list(cursor)?;

        Ok(FunctionFailureError {
            keyspace,
            function,
            arg_types,
        })
    }
}

/// A non-timeout exception during a write request.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct WriteFailureError {
    /// Consistency of the query having triggered the exception.
    pub cl: Consistency,
    /// The number of nodes having answered the request.
    pub received: CInt,
    /// The number of replicas whose acknowledgement is required to achieve `cl`.
    pub block_for: CInt,
    /// Number of nodes that experienced a failure while executing the request.
    pub num_failures: CInt,
    /// Describes the type of the write that failed.
    pub write_type: WriteType,
}

impl Serialize for WriteFailureError {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.cl.serialize(cursor);
        self.received.serialize(cursor);
        self.block_for.serialize(cursor);
        self.num_failures.serialize(cursor);
        self.write_type.serialize(cursor);
    }
}

impl FromCursor for WriteFailureError {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<WriteFailureError> {
        let cl = Consistency::from_cursor(cursor)?;
        let received = CInt::from_cursor(cursor)?;
        let block_for = CInt::from_cursor(cursor)?;
        let num_failures = CInt::from_cursor(cursor)?;
        let write_type = WriteType::from_cursor(cursor)?;

        Ok(WriteFailureError {
            cl,
            received,
            block_for,
            num_failures,
            write_type,
        })
    }
}

/// Describes the type of the write that failed.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone, Display)]
pub enum WriteType {
    Simple,
    Batch,
    UnloggedBatch,
    Counter,
    BatchLog,
    Cas,
    View,
    Cdc,
}

impl Serialize for WriteType {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        let name = match self {
            WriteType::Simple => "SIMPLE",
            WriteType::Batch => "BATCH",
            WriteType::UnloggedBatch => "UNLOGGED_BATCH",
            WriteType::Counter => "COUNTER",
            WriteType::BatchLog => "BATCH_LOG",
            WriteType::Cas => "CAS",
            WriteType::View => "VIEW",
            WriteType::Cdc => "CDC",
        };

        serialize_str(cursor, name);
    }
}

impl FromCursor for WriteType {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<WriteType> {
        match from_cursor_str(cursor)? {
            "SIMPLE" => Ok(WriteType::Simple),
            "BATCH" => Ok(WriteType::Batch),
            "UNLOGGED_BATCH" => Ok(WriteType::UnloggedBatch),
            "COUNTER" => Ok(WriteType::Counter),
            "BATCH_LOG" => Ok(WriteType::BatchLog),
            "CAS" => Ok(WriteType::Cas),
            "VIEW" => Ok(WriteType::View),
            "CDC" => Ok(WriteType::Cdc),
            wt => Err(Error::UnexpectedWriteType(wt.into())),
        }
    }
}

/// The query attempted to create a keyspace or a table that was already existing.
#[derive(Debug, PartialEq, Ord, PartialOrd, Eq, Hash, Clone)]
pub struct AlreadyExistsError {
    /// Keyspace name.
    pub ks: String,
    /// Table name, empty if the keyspace was created.
    pub table: String,
}

impl Serialize for AlreadyExistsError {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        serialize_str(cursor, &self.ks);
        serialize_str(cursor, &self.table);
    }
}

impl FromCursor for AlreadyExistsError {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<AlreadyExistsError> {
        let ks = from_cursor_str(cursor)?.to_string();
        let table = from_cursor_str(cursor)?.to_string();

        Ok(AlreadyExistsError { ks, table })
    }
}

/// Can be thrown while a prepared statement tries to be executed if the provided prepared
/// statement ID is not known by this host.
#[derive(Debug, PartialEq, Ord, PartialOrd, Eq, Hash, Clone)]
pub struct UnpreparedError {
    /// Unknown ID.
    pub id: CBytesShort,
}

impl Serialize for UnpreparedError {
    fn serialize(&self, cursor: &mut Cursor<&mut Vec<u8>>) {
        self.id.serialize(cursor);
    }
}

impl FromCursor for UnpreparedError {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> error::Result<UnpreparedError> {
        let id = CBytesShort::from_cursor(cursor)?;
        Ok(UnpreparedError { id })
    }
}

#[cfg(test)]
fn test_encode_decode(bytes: &[u8], expected: ErrorBody) {
    {
        let mut cursor: Cursor<&[u8]> = Cursor::new(bytes);
        let result = ErrorBody::from_cursor(&mut cursor).unwrap();
        assert_eq!(expected, result);
    }

    assert_eq!(expected.serialize_to_vec(), bytes);
}
