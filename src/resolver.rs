//! Direct A-record lookups against one DNS server.

use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use hickory_resolver::{
    config::{NameServerConfig, NameServerConfigGroup, ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
    proto::{op::ResponseCode, xfer::Protocol, ProtoErrorKind},
    ResolveError, TokioResolver,
};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Looks up the address a host name currently points to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// Resolve `hostname` to its single address.
    ///
    /// `Ok(None)` means the name has no A record yet.
    async fn lookup(&self, hostname: &str) -> Result<Option<IpAddr>>;
}

/// Resolver pinned to a single server, bypassing the system configuration.
pub struct AuthoritativeResolver {
    resolver: TokioResolver,
    server: SocketAddr,
}

impl AuthoritativeResolver {
    /// Query `server` over UDP only, failing each lookup after `timeout`.
    pub fn new(server: SocketAddr, timeout: Duration) -> Self {
        let mut name_server = NameServerConfig::new(server, Protocol::Udp);
        name_server.trust_negative_responses = true;

        let config = ResolverConfig::from_parts(
            None,
            vec![],
            NameServerConfigGroup::from(vec![name_server]),
        );

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        // Every pass must see the server's current answer.
        opts.cache_size = 0;

        let resolver =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Self { resolver, server }
    }

    /// The server every lookup is sent to.
    pub fn server(&self) -> SocketAddr {
        self.server
    }
}

#[async_trait]
impl DnsLookup for AuthoritativeResolver {
    async fn lookup(&self, hostname: &str) -> Result<Option<IpAddr>> {
        let fqdn = format!("{}.", hostname.trim_end_matches('.'));

        match self.resolver.ipv4_lookup(fqdn.as_str()).await {
            Ok(lookup) => {
                let answers: Vec<IpAddr> = lookup.iter().map(|a| IpAddr::V4(a.0)).collect();
                single_answer(hostname, answers)
            }
            Err(err) => classify(hostname, err),
        }
    }
}

fn single_answer(hostname: &str, answers: Vec<IpAddr>) -> Result<Option<IpAddr>> {
    match answers.as_slice() {
        [ip] => Ok(Some(*ip)),
        _ => Err(DdnsError::DnsAmbiguous {
            hostname: hostname.to_string(),
            answers,
        }),
    }
}

fn classify(hostname: &str, err: ResolveError) -> Result<Option<IpAddr>> {
    let Some(proto) = err.proto() else {
        return Err(DdnsError::Dns {
            hostname: hostname.to_string(),
            message: err.to_string(),
        });
    };

    match proto.kind() {
        // NXDOMAIN, or the name exists without an A record.
        ProtoErrorKind::NoRecordsFound {
            response_code: ResponseCode::NXDomain | ResponseCode::NoError,
            ..
        } => Ok(None),
        ProtoErrorKind::Timeout => Err(DdnsError::DnsTimeout {
            hostname: hostname.to_string(),
            message: err.to_string(),
        }),
        _ => Err(DdnsError::Dns {
            hostname: hostname.to_string(),
            message: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_resolver::proto::op::{Message, MessageType};
    use hickory_resolver::proto::rr::{rdata::A, RData, Record};
    use hickory_resolver::proto::ProtoError;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;
    use tokio::net::UdpSocket;

    /// UDP DNS server answering A queries from `zone`; unknown names get NXDOMAIN.
    async fn spawn_dns_server(zone: HashMap<&'static str, Vec<Ipv4Addr>>) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Ok(request) = Message::from_vec(&buf[..len]) else {
                    continue;
                };

                let mut response = Message::new();
                response
                    .set_id(request.id())
                    .set_message_type(MessageType::Response)
                    .set_op_code(request.op_code())
                    .set_recursion_desired(request.recursion_desired())
                    .set_authoritative(true);
                response.add_queries(request.queries().to_vec());

                if let Some(query) = request.queries().first() {
                    let name = query.name().to_string().to_lowercase();
                    match zone.get(name.trim_end_matches('.')) {
                        Some(ips) => {
                            for ip in ips {
                                response.add_answer(Record::from_rdata(
                                    query.name().clone(),
                                    60,
                                    RData::A(A(*ip)),
                                ));
                            }
                        }
                        None => {
                            response.set_response_code(ResponseCode::NXDomain);
                        }
                    }
                }

                if let Ok(bytes) = response.to_vec() {
                    let _ = socket.send_to(&bytes, peer).await;
                }
            }
        });

        addr
    }

    async fn resolver_for(zone: HashMap<&'static str, Vec<Ipv4Addr>>) -> AuthoritativeResolver {
        let addr = spawn_dns_server(zone).await;
        AuthoritativeResolver::new(addr, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_single_a_record() {
        let resolver = resolver_for(HashMap::from([(
            "home.example.com",
            vec![Ipv4Addr::new(203, 0, 113, 1)],
        )]))
        .await;

        let ip = resolver.lookup("home.example.com").await.unwrap();
        assert_eq!(ip, Some("203.0.113.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_not_found_is_no_address() {
        let resolver = resolver_for(HashMap::new()).await;
        assert_eq!(resolver.lookup("missing.example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_name_without_a_record_is_no_address() {
        let resolver = resolver_for(HashMap::from([("txt.example.com", vec![])])).await;
        assert_eq!(resolver.lookup("txt.example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multiple_a_records_is_error() {
        let resolver = resolver_for(HashMap::from([(
            "multi.example.com",
            vec![Ipv4Addr::new(203, 0, 113, 1), Ipv4Addr::new(203, 0, 113, 2)],
        )]))
        .await;

        let err = resolver.lookup("multi.example.com").await.unwrap_err();
        assert!(matches!(err, DdnsError::DnsAmbiguous { ref answers, .. } if answers.len() == 2));
    }

    #[tokio::test]
    async fn test_silent_server_times_out_once() {
        // Bound but never answers.
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let timeout = Duration::from_millis(400);
        let resolver = AuthoritativeResolver::new(addr, timeout);
        assert_eq!(resolver.server(), addr);

        let started = std::time::Instant::now();
        let err = resolver.lookup("home.example.com").await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_dns_timeout(), "unexpected error: {err}");
        assert!(elapsed >= timeout, "gave up after {elapsed:?}");
        // No second attempt over another transport.
        assert!(elapsed < timeout * 2 - Duration::from_millis(100), "took {elapsed:?}");
    }

    #[test]
    fn test_timeout_is_classified() {
        let err = ResolveError::from(ProtoError::from(ProtoErrorKind::Timeout));
        let result = classify("home.example.com", err);
        assert!(matches!(result, Err(ref e) if e.is_dns_timeout()));
    }

    #[test]
    fn test_zero_answers_without_not_found_is_error() {
        assert!(matches!(
            single_answer("home.example.com", vec![]),
            Err(DdnsError::DnsAmbiguous { .. })
        ));
    }
}
