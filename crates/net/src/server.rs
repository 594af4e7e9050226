//! TCP server exposing a booking engine
//!
//! Each connection is a sequence of request/response pairs. Engine calls
//! block on storage, so they run on the blocking pool under a deadline.
//! A call that misses its deadline keeps running; the client is told the
//! outcome is indeterminate.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use boxoffice_core::{BookingEngine, Film, Hall, Storage};
use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{ErrorBody, ErrorKind, Request, Response};

/// Booking server handle
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Start a new server on the given port
    pub async fn start<S>(
        port: u16,
        engine: Arc<BookingEngine<S>>,
        request_timeout: Duration,
    ) -> Result<Self>
    where
        S: Storage + Send + Sync + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, timeout_ms = request_timeout.as_millis() as u64, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);

        tokio::spawn(accept_loop(
            listener,
            engine,
            request_timeout,
            shutdown_tx.clone(),
        ));

        Ok(Server {
            addr: bound_addr,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and close open ones
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop<S>(
    listener: TcpListener,
    engine: Arc<BookingEngine<S>>,
    request_timeout: Duration,
    shutdown_tx: broadcast::Sender<()>,
) where
    S: Storage + Send + Sync + 'static,
{
    let mut shutdown_rx = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            engine.clone(),
                            request_timeout,
                            shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Serve requests on one connection until it closes
async fn handle_connection<S>(
    stream: TcpStream,
    addr: SocketAddr,
    engine: Arc<BookingEngine<S>>,
    request_timeout: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    S: Storage + Send + Sync + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    loop {
        let request = tokio::select! {
            result = read_frame::<Request, _>(&mut reader) => result,
            _ = shutdown_rx.recv() => {
                debug!(addr = %addr, "Closing connection for shutdown");
                break;
            }
        };

        match request {
            Ok(request) => {
                let response = dispatch(engine.clone(), request, request_timeout).await;
                if !respond(&mut writer, &response).await {
                    break;
                }
            }
            Err(Error::ConnectionClosed) => {
                debug!(addr = %addr, "Connection closed");
                break;
            }
            Err(Error::Protocol(reason)) => {
                warn!(addr = %addr, reason = %reason, "Malformed request");
                let response = Response::Error(ErrorBody::new(ErrorKind::Validation, reason));
                let _ = respond(&mut writer, &response).await;
                break;
            }
            Err(e) => {
                warn!(addr = %addr, error = %e, "Read error");
                break;
            }
        }
    }
}

async fn respond(writer: &mut WriteHalf<TcpStream>, response: &Response) -> bool {
    match write_frame(writer, response).await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "Write failed");
            false
        }
    }
}

/// Answer one request
async fn dispatch<S>(
    engine: Arc<BookingEngine<S>>,
    request: Request,
    request_timeout: Duration,
) -> Response
where
    S: Storage + Send + Sync + 'static,
{
    let name = request.name();
    debug!(request = name, "Handling request");
    run_blocking(name, request_timeout, move || execute(&engine, request)).await
}

/// Run `work` on the blocking pool, giving up on it after `deadline`
async fn run_blocking<F>(name: &'static str, deadline: Duration, work: F) -> Response
where
    F: FnOnce() -> Response + Send + 'static,
{
    match tokio::time::timeout(deadline, tokio::task::spawn_blocking(work)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!(request = name, error = %e, "Request handler failed");
            Response::Error(ErrorBody::new(ErrorKind::Internal, "request handler failed"))
        }
        Err(_) => {
            warn!(request = name, deadline_ms = deadline.as_millis() as u64, "Request missed its deadline");
            Response::Error(ErrorBody::new(
                ErrorKind::Indeterminate,
                format!(
                    "{name} did not finish within {} ms; check current state before retrying",
                    deadline.as_millis()
                ),
            ))
        }
    }
}

fn execute<S: Storage>(engine: &BookingEngine<S>, request: Request) -> Response {
    let name = request.name();
    let result = match request {
        Request::AdmitSession(proposal) => engine.admit_session(proposal).map(Response::Session),
        Request::AdmitBooking(proposal) => engine.admit_booking(proposal).map(Response::Booking),
        Request::CancelBooking {
            booking_id,
            user_id,
        } => engine
            .cancel_booking(booking_id, user_id)
            .map(Response::Booking),
        Request::ListFreeSeats { session_id } => engine
            .list_free_seats(session_id)
            .map(|seats| Response::FreeSeats { seats }),
        Request::ListSessions { hall_id, from, to } => engine
            .list_sessions_in_range(hall_id, from, to)
            .map(|sessions| Response::Sessions { sessions }),
        Request::ListFilmSessions { film_id } => engine
            .list_sessions_for_film(film_id)
            .map(|sessions| Response::Sessions { sessions }),
        Request::ListMyBookings { user_id } => engine
            .list_bookings_for_user(user_id)
            .map(|bookings| Response::Bookings { bookings }),
        Request::ListBookings => engine
            .list_bookings()
            .map(|bookings| Response::Bookings { bookings }),
        Request::CreateFilm {
            title,
            genre,
            duration_minutes,
            rating,
            description,
            image_url,
        } => {
            let mut film = Film::new(title, genre, duration_minutes)
                .with_rating(rating)
                .with_description(description);
            film.image_url = image_url;
            engine.create_film(film).map(Response::Film)
        }
        Request::ListFilms => engine.list_films().map(|films| Response::Films { films }),
        Request::DeleteFilm { film_id } => engine
            .delete_film(film_id)
            .map(|()| Response::Deleted { id: film_id }),
        Request::CreateHall { name, capacity } => {
            engine.create_hall(Hall::new(name, capacity)).map(Response::Hall)
        }
        Request::ListHalls => engine.list_halls().map(|halls| Response::Halls { halls }),
        Request::DeleteHall { hall_id } => engine
            .delete_hall(hall_id)
            .map(|()| Response::Deleted { id: hall_id }),
        Request::Ping => Ok(Response::Pong),
    };

    result.unwrap_or_else(|e| {
        if e.is_conflict() {
            debug!(request = name, error = %e, "Request lost a conflict");
        } else {
            warn!(request = name, error = %e, "Request failed");
        }
        Response::from(e)
    })
}
