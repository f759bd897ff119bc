//! RFC 2812 numeric reply codes recognised by the dispatch table.

pub const RPL_WELCOME: u16 = 1; // <nick> :Welcome to the Internet Relay Network <nick>!<user>@<host>
pub const RPL_YOURHOST: u16 = 2; // <nick> :Your host is <servername>, running version <ver>
pub const RPL_CREATED: u16 = 3; // <nick> :This server was created <date>
pub const RPL_MYINFO: u16 = 4; // <nick> <servername> <version> <umodes> <chanmodes> [<chanmodes with arg>]
pub const RPL_ISUPPORT: u16 = 5; // <nick> 1*13<TOKEN[=value]> :are supported by this server

pub const RPL_STATSLINKINFO: u16 = 211;
pub const RPL_STATSYLINE: u16 = 218;
pub const RPL_ENDOFSTATS: u16 = 219; // <nick> <stats letter> :End of STATS report
pub const RPL_UMODEIS: u16 = 221; // <nick> <user mode string>
pub const RPL_STATSVLINE: u16 = 240;
pub const RPL_STATSHLINE: u16 = 244;

pub const RPL_LUSERCLIENT: u16 = 251; // :There are <int> users and <int> services on <int> servers
pub const RPL_LUSEROP: u16 = 252; // <int> :operator(s) online
pub const RPL_LUSERUNKNOWN: u16 = 253; // <int> :unknown connection(s)
pub const RPL_LUSERCHANNELS: u16 = 254; // <int> :channels formed
pub const RPL_LUSERME: u16 = 255; // :I have <int> clients and <int> servers

pub const RPL_AWAY: u16 = 301; // <nick> :<away message>
pub const RPL_ISON: u16 = 303; // :*1<nick> *( " " <nick> )
pub const RPL_UNAWAY: u16 = 305;
pub const RPL_NOWAWAY: u16 = 306;
pub const RPL_WHOISUSER: u16 = 311; // <nick> <user> <host> * :<real name>
pub const RPL_WHOISSERVER: u16 = 312; // <nick> <server> :<server info>
pub const RPL_WHOISOPERATOR: u16 = 313; // <nick> :is an IRC operator
pub const RPL_ENDOFWHO: u16 = 315; // <name> :End of WHO list
pub const RPL_WHOISIDLE: u16 = 317; // <nick> <integer> [<signon>] :seconds idle
pub const RPL_ENDOFWHOIS: u16 = 318; // <nick> :End of WHOIS list
pub const RPL_WHOISCHANNELS: u16 = 319; // <nick> :*( ( "@" / "+" ) <channel> " " )
pub const RPL_LISTSTART: u16 = 321;
pub const RPL_LIST: u16 = 322; // <channel> <# visible> :<topic>
pub const RPL_LISTEND: u16 = 323;
pub const RPL_CHANNELMODEIS: u16 = 324; // <channel> <mode> <mode params>
pub const RPL_CREATIONTIME: u16 = 329; // <channel> <unix time>
pub const RPL_NOTOPIC: u16 = 331; // <channel> :No topic is set
pub const RPL_TOPIC: u16 = 332; // <channel> :<topic>
pub const RPL_TOPICWHOTIME: u16 = 333; // <channel> <setter> <unix time>
pub const RPL_WHOREPLY: u16 = 352; // <channel> <user> <host> <server> <nick> <H|G>[*][@|+] :<hopcount> <real name>
pub const RPL_NAMREPLY: u16 = 353; // ( "=" / "*" / "@" ) <channel> :[ "@" / "+" ] <nick> *( " " ... )
pub const RPL_LINKS: u16 = 364; // <mask> <server> :<hopcount> <server info>
pub const RPL_ENDOFLINKS: u16 = 365;
pub const RPL_ENDOFNAMES: u16 = 366; // <channel> :End of NAMES list
pub const RPL_BANLIST: u16 = 367; // <channel> <banmask> [<setter> <time>]
pub const RPL_ENDOFBANLIST: u16 = 368;
pub const RPL_INFO: u16 = 371;
pub const RPL_MOTD: u16 = 372; // :- <text>
pub const RPL_INFOSTART: u16 = 373;
pub const RPL_ENDOFINFO: u16 = 374;
pub const RPL_MOTDSTART: u16 = 375; // :- <server> Message of the day -
pub const RPL_ENDOFMOTD: u16 = 376;
pub const RPL_YOUREOPER: u16 = 381;
pub const RPL_YOURESERVICE: u16 = 383; // You are service <servicename>
pub const RPL_TIME: u16 = 391; // <server> :<local time>

pub const ERR_NOSUCHCHANNEL: u16 = 403; // <channel name> :No such channel
pub const ERR_NOMOTD: u16 = 422;
pub const ERR_ERRONEUSNICKNAME: u16 = 432;
pub const ERR_NICKNAMEINUSE: u16 = 433;
pub const ERR_NICKCOLLISION: u16 = 436;
pub const ERR_UNAVAILRESOURCE: u16 = 437;

/// First and last codes of the error reply block.
pub const ERR_FIRST: u16 = 400;
pub const ERR_LAST: u16 = 599;
