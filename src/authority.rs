//! Hickory request handler serving the published zones.

use async_trait::async_trait;
use hickory_proto::op::{Header, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::Record;
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::metrics::{self, QueryResult, Timer};
use crate::resolver::{Resolution, Resolver, Response, SectionRecord};
use crate::state::DnsState;

/// Convert section records to wire records, dropping any that cannot be
/// encoded.
fn to_wire(records: &[SectionRecord]) -> Vec<Record> {
    records
        .iter()
        .filter_map(|r| match r.record.to_record(&r.owner, r.ttl) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(owner = %r.owner, record = %r.record, error = %e, "skipping unencodable record");
                None
            }
        })
        .collect()
}

fn servfail() -> ResponseInfo {
    let mut header = Header::new();
    header.set_response_code(ResponseCode::ServFail);
    header.into()
}

/// Request handler answering from the current [`DnsState`] snapshot.
pub struct ZoneAuthority {
    resolver: Resolver,
    state: DnsState,
}

impl ZoneAuthority {
    /// Create a handler for the given configuration and state.
    pub fn new(config: Arc<DnsConfig>, state: DnsState) -> Result<Self, DnsError> {
        Ok(Self {
            resolver: Resolver::new(config)?,
            state,
        })
    }

    async fn send<R: ResponseHandler>(
        request: &Request,
        response_handle: &mut R,
        rcode: ResponseCode,
        authoritative: bool,
        answers: &[Record],
        authority: &[Record],
        additional: &[Record],
    ) -> ResponseInfo {
        let builder = MessageResponseBuilder::from_message_request(request);
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(authoritative);
        header.set_response_code(rcode);

        let response = builder.build(
            header,
            answers.iter(),
            authority.iter(),
            std::iter::empty(),
            additional.iter(),
        );

        match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, "failed to send DNS response");
                servfail()
            }
        }
    }

    async fn send_answer<R: ResponseHandler>(
        request: &Request,
        mut response_handle: R,
        response: Response,
    ) -> ResponseInfo {
        Self::send(
            request,
            &mut response_handle,
            response.rcode,
            response.authoritative,
            &to_wire(&response.answers),
            &to_wire(&response.authority),
            &to_wire(&response.additional),
        )
        .await
    }

    /// Stream a transfer, one DNS message per batch.
    async fn send_transfer<R: ResponseHandler>(
        request: &Request,
        mut response_handle: R,
        messages: Vec<Vec<SectionRecord>>,
    ) -> ResponseInfo {
        let mut last = servfail();
        let mut total = 0usize;

        for batch in &messages {
            let records = to_wire(batch);
            total += records.len();
            last = Self::send(
                request,
                &mut response_handle,
                ResponseCode::NoError,
                true,
                &records,
                &[],
                &[],
            )
            .await;
            if last.response_code() == ResponseCode::ServFail {
                break;
            }
        }

        metrics::record_axfr_records(total);
        last
    }

    fn result_of(response: &Response) -> QueryResult {
        if !response.authoritative {
            QueryResult::NotAuthoritative
        } else if response.rcode == ResponseCode::NXDomain {
            QueryResult::NxDomain
        } else if response.answers.is_empty() {
            QueryResult::NoData
        } else {
            QueryResult::Success
        }
    }
}

#[async_trait]
impl RequestHandler for ZoneAuthority {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let timer = Timer::start();

        if request.message_type() != MessageType::Query || request.op_code() != OpCode::Query {
            debug!(op_code = ?request.op_code(), "rejecting non-query request");
            metrics::record_query("-", QueryResult::NotImplemented, timer.elapsed());
            return Self::send(
                request,
                &mut response_handle,
                ResponseCode::NotImp,
                false,
                &[],
                &[],
                &[],
            )
            .await;
        }

        let Some(query) = request.queries().first() else {
            return Self::send(
                request,
                &mut response_handle,
                ResponseCode::FormErr,
                false,
                &[],
                &[],
                &[],
            )
            .await;
        };

        let qname = query.name().to_string();
        let qtype = query.query_type();
        let rtype_str = qtype.to_string();

        if !self.state.is_ready() {
            debug!(name = %qname, "DNS state not ready, returning SERVFAIL");
            metrics::record_query(&rtype_str, QueryResult::NotReady, timer.elapsed());
            return Self::send(
                request,
                &mut response_handle,
                ResponseCode::ServFail,
                false,
                &[],
                &[],
                &[],
            )
            .await;
        }

        trace!(name = %qname, rtype = ?qtype, src = %request.src(), "DNS query");
        let table = self.state.snapshot();

        let (info, result) = match self.resolver.resolve(&table, &qname, qtype) {
            Resolution::Transfer(messages) => {
                debug!(name = %qname, messages = messages.len(), "zone transfer");
                let info = Self::send_transfer(request, response_handle, messages).await;
                (info, QueryResult::Transfer)
            }
            Resolution::Answer(response) => {
                debug!(
                    name = %qname,
                    rtype = ?qtype,
                    rcode = ?response.rcode,
                    answers = response.answers.len(),
                    "DNS answer"
                );
                let result = Self::result_of(&response);
                let info = Self::send_answer(request, response_handle, response).await;
                (info, result)
            }
        };

        let result = if info.response_code() == ResponseCode::ServFail {
            QueryResult::Error
        } else {
            result
        };
        metrics::record_query(&rtype_str, result, timer.elapsed());
        info
    }
}
